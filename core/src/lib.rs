//! divide-lm-core
//!
//! Weighted log-domain division of n-gram language models in ARPA format:
//! the result scores every n-gram as
//! `wnum * numerator.score(g) - wden * denominator.score(g)`.
//!
//! Public API:
//! - `Weight` - log-probability / log-backoff pair of one entry
//! - `ArpaModel` - insertion-ordered ARPA model with recursive backoff scoring
//! - `Divider` - merges a numerator and a denominator model into a divided one
//! - `LmConfig` / `DivideConfig` - per-model and per-job configuration (TOML)
//! - `Progress` - reporting hook for long loops
//! - `DivideError` - error taxonomy shared by all of the above
//!
//! The library never installs a logger; it emits `tracing` events and leaves the
//! subscriber to the binary.

pub mod arpa;
pub use arpa::{ArpaModel, ArpaWriter, Weight, BOS, EOS};

pub mod config;
pub use config::{DivideConfig, LmConfig};

pub mod divider;
pub use divider::{Divider, NewKeys};

pub mod error;
pub use error::{DivideError, Result};

pub mod progress;
pub use progress::{Progress, Silent};

/// Run a whole divide job.
///
/// Validates the request, loads the numerator and then the denominator, and
/// divides. Returns the divided model when `config.return_model` is set.
///
/// ```no_run
/// use divide_lm_core::{divide, DivideConfig, Silent};
///
/// let config = DivideConfig::load_toml("job.toml")?;
/// divide(&config, &mut Silent)?;
/// # Ok::<(), divide_lm_core::DivideError>(())
/// ```
pub fn divide(config: &DivideConfig, progress: &mut dyn Progress) -> Result<Option<ArpaModel>> {
    config.validate()?;
    let divider = Divider::load(&config.numerator, &config.denominator, progress)?;
    divider.divide(
        config.weight_numerator,
        config.weight_denominator,
        config.output.as_deref(),
        config.return_model,
        progress,
    )
}
