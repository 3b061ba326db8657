pub mod capacity_target;
pub mod release;
