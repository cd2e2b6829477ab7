pub mod pacing;
