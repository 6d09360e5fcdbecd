//! Weighted log-domain division of one ARPA model by another.
//!
//! The divided model scores every n-gram as
//! `wnum * numerator.score(g) - wden * denominator.score(g)`. Entries of the
//! numerator are re-weighted in place; denominator entries the numerator lacks
//! ("new keys") are synthesized after the numerator entries of the same order.
use std::io::{self, Write};
use std::path::Path;

use crate::arpa::{write_atomically, ArpaModel, ArpaWriter, Weight};
use crate::config::{check_weight, LmConfig};
use crate::error::{DivideError, Result};
use crate::progress::Progress;

/// Denominator entries whose key does not occur in the numerator, per order.
///
/// Stored as positions into the denominator's entry list, in denominator order.
#[derive(Debug, Clone, Default)]
pub struct NewKeys {
    by_order: Vec<Vec<usize>>,
}

impl NewKeys {
    /// Compute `denominator keys − numerator keys` for every denominator order.
    pub fn between(numerator: &ArpaModel, denominator: &ArpaModel) -> Self {
        let by_order = (1..=denominator.order())
            .map(|order| {
                denominator
                    .positions(order)
                    .filter(|&p| !numerator.contains(denominator.entry_at(p).0))
                    .collect::<Vec<_>>()
            })
            .collect();
        Self { by_order }
    }

    /// Number of new keys of `order` (0 outside the denominator's orders).
    pub fn count(&self, order: usize) -> usize {
        self.positions(order).len()
    }

    pub fn total(&self) -> usize {
        self.by_order.iter().map(Vec::len).sum()
    }

    fn positions(&self, order: usize) -> &[usize] {
        match order.checked_sub(1).and_then(|i| self.by_order.get(i)) {
            Some(positions) => positions.as_slice(),
            None => &[],
        }
    }
}

/// Holds a loaded numerator/denominator pair and produces divided models.
#[derive(Debug, Clone)]
pub struct Divider {
    numerator: ArpaModel,
    denominator: ArpaModel,
    new_keys: NewKeys,
}

impl Divider {
    /// Pair two loaded models and compute their new keys.
    pub fn new(numerator: ArpaModel, denominator: ArpaModel) -> Self {
        if denominator.order() > numerator.order() {
            tracing::warn!(
                "denominator order {} exceeds numerator order {}; orders above {} are ignored",
                denominator.order(),
                numerator.order(),
                numerator.order()
            );
        }
        let new_keys = NewKeys::between(&numerator, &denominator);
        let divider = Self {
            numerator,
            denominator,
            new_keys,
        };
        tracing::info!(
            "{} denominator entries are missing from the numerator",
            divider.added_entries()
        );
        divider
    }

    /// Load both models from their configs, numerator first.
    pub fn load(
        numerator: &LmConfig,
        denominator: &LmConfig,
        progress: &mut dyn Progress,
    ) -> Result<Self> {
        let num = ArpaModel::load_with_progress(
            &numerator.model_path,
            numerator.unknown_weight,
            progress,
        )?;
        let den = ArpaModel::load_with_progress(
            &denominator.model_path,
            denominator.unknown_weight,
            progress,
        )?;
        Ok(Self::new(num, den))
    }

    pub fn numerator(&self) -> &ArpaModel {
        &self.numerator
    }

    pub fn denominator(&self) -> &ArpaModel {
        &self.denominator
    }

    pub fn new_keys(&self) -> &NewKeys {
        &self.new_keys
    }

    /// New-key grams of one order, in denominator order.
    pub fn new_grams(&self, order: usize) -> impl Iterator<Item = &str> {
        self.new_keys
            .positions(order)
            .iter()
            .map(move |&p| self.denominator.entry_at(p).0)
    }

    /// New-key entries the divided model gains over the numerator.
    pub fn added_entries(&self) -> usize {
        (1..=self.numerator.order())
            .map(|order| self.new_keys.count(order))
            .sum()
    }

    /// Per-order counts of the divided model.
    pub fn output_counts(&self) -> Vec<usize> {
        self.numerator
            .counts()
            .iter()
            .enumerate()
            .map(|(i, count)| count + self.new_keys.count(i + 1))
            .collect()
    }

    /// Divide and write the result to `output` and/or return it in memory.
    ///
    /// At least one of `output` and `return_model` must be requested. The file
    /// only appears at `output` once it is complete.
    pub fn divide(
        &self,
        wnum: f64,
        wden: f64,
        output: Option<&Path>,
        return_model: bool,
        progress: &mut dyn Progress,
    ) -> Result<Option<ArpaModel>> {
        if output.is_none() && !return_model {
            return Err(DivideError::NoOutputRequested);
        }
        check_weight("weight_numerator", wnum)?;
        check_weight("weight_denominator", wden)?;
        match output {
            Some(path) => {
                tracing::info!("writing divided model to {}", path.display());
                write_atomically(path, |out| {
                    self.run(wnum, wden, Some(ArpaWriter::new(out)), return_model, progress)
                })
            }
            None => self.run::<io::Sink>(wnum, wden, None, true, progress),
        }
    }

    /// Divide and stream the result to `writer`.
    pub fn divide_to_writer<W: Write>(
        &self,
        wnum: f64,
        wden: f64,
        writer: W,
        return_model: bool,
        progress: &mut dyn Progress,
    ) -> Result<Option<ArpaModel>> {
        check_weight("weight_numerator", wnum)?;
        check_weight("weight_denominator", wden)?;
        self.run(wnum, wden, Some(ArpaWriter::new(writer)), return_model, progress)
    }

    fn run<W: Write>(
        &self,
        wnum: f64,
        wden: f64,
        writer: Option<ArpaWriter<W>>,
        keep: bool,
        progress: &mut dyn Progress,
    ) -> Result<Option<ArpaModel>> {
        let num = &self.numerator;
        let den = &self.denominator;
        let counts = self.output_counts();
        let mut sink = Sink {
            model: keep.then(|| ArpaModel::with_counts(counts.clone(), Weight::UNKNOWN)),
            writer,
        };
        sink.write_header(&counts)?;

        for order in 1..=num.order() {
            sink.begin_order(order)?;

            tracing::info!("processing {}-gram entries", order);
            progress.start(
                &format!("dividing {}-grams", order),
                num.counts()[order - 1] as u64,
            );
            for (gram, weight) in num.ngrams(order) {
                let log_prob = wnum * weight.log_prob - wden * den.score(gram);
                let mut log_backoff = wnum * weight.log_backoff;
                // the highest order carries no backoff
                if order < num.order() {
                    if let Some(den_weight) = den.get(gram) {
                        log_backoff -= wden * den_weight.log_backoff;
                    }
                }
                sink.emit(gram, Weight::new(log_prob, log_backoff))?;
                progress.advance(1);
            }
            progress.finish();

            let added = self.new_keys.count(order);
            if added == 0 {
                continue;
            }
            tracing::info!("adding {} new {}-gram entries", added, order);
            progress.start(&format!("adding {}-grams", order), added as u64);
            for &position in self.new_keys.positions(order) {
                let (gram, den_weight) = den.entry_at(position);
                let log_prob = wnum * num.score(gram) - wden * den_weight.log_prob;
                let log_backoff = -wden * den_weight.log_backoff;
                sink.emit(gram, Weight::new(log_prob, log_backoff))?;
                progress.advance(1);
            }
            progress.finish();
        }

        sink.finish()
    }
}

/// Destination of divided entries: a stream, an in-memory model, or both.
struct Sink<W: Write> {
    model: Option<ArpaModel>,
    writer: Option<ArpaWriter<W>>,
}

impl<W: Write> Sink<W> {
    fn write_header(&mut self, counts: &[usize]) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_header(counts)?;
        }
        Ok(())
    }

    fn begin_order(&mut self, order: usize) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.begin_order(order)?;
        }
        if let Some(model) = self.model.as_mut() {
            model.begin_order();
        }
        Ok(())
    }

    fn emit(&mut self, gram: &str, weight: Weight) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_entry(gram, &weight)?;
        }
        if let Some(model) = self.model.as_mut() {
            model.push(gram, weight);
        }
        Ok(())
    }

    fn finish(self) -> Result<Option<ArpaModel>> {
        if let Some(writer) = self.writer {
            writer.finish()?;
        }
        Ok(self.model)
    }
}
