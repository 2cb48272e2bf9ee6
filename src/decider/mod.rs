// src/decider/mod.rs

pub mod action;
pub mod decision;
pub mod flip_flop;
pub mod publisher;

pub use action::{Action, ActionListener};
pub use decision::{Decision, DecisionSlot};
pub use flip_flop::{FlipFlopConfig, FlipFlopDetector, TimedFlipFlopDetector};
pub use publisher::Publisher;
