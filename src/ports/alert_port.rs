//! Alert transport port trait.

use crate::domain::error::SmcError;

pub trait AlertPort {
    fn send(&self, message: &str) -> Result<(), SmcError>;
}
