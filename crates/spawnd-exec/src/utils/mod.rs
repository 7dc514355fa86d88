pub mod limits;
pub use limits::apply_rlimits;
