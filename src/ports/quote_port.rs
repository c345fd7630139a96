//! Live price snapshot port trait.

use crate::domain::error::SmcError;
use crate::domain::observation::PriceObservation;

pub trait QuotePort {
    /// Latest `{low, high, last}` snapshot for `ticker`.
    ///
    /// `Ok(None)` means the source has nothing for this ticker right now;
    /// `Err` means the source itself failed.
    fn snapshot(&self, ticker: &str) -> Result<Option<PriceObservation>, SmcError>;
}
