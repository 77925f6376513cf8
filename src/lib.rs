pub mod epirisk;
pub mod sheets;

mod comparisons;
mod config;
mod hopkins;
mod ioutil;
mod progress;
mod regions;
mod statistics;
mod timeseries;

pub use comparisons::*;
pub use config::*;
pub use hopkins::*;
pub use ioutil::*;
pub use progress::*;
pub use regions::*;
pub use statistics::*;
pub use timeseries::*;
