//! Positions module - FIFO lot matching over a security's transaction stream.

mod fifo_matcher;
mod positions_filter;
mod positions_model;

pub use fifo_matcher::FifoPositions;
pub use positions_filter::PositionsFilter;
pub use positions_model::{ClosedPosition, OpenedPosition, Position, PositionHistory};
