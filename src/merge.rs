// Two-sensor stream alignment
//
// Merges two chronologically ordered single-sensor streams into one ordered
// stream tagged with the sensor each reading came from. Readings taken at the
// same instant by both sensors come out as a coincident pair, sensor 1 first.

use std::iter::Peekable;

/// A single sensor reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Which sensor(s) produced a merged sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Sensor1,
    Sensor2,
    /// Both sensors reported at this timestamp
    Both,
}

impl Origin {
    /// Numeric sensor tag (1, 2, or 3 for a coincident reading)
    pub fn code(&self) -> u8 {
        match self {
            Origin::Sensor1 => 1,
            Origin::Sensor2 => 2,
            Origin::Both => 3,
        }
    }
}

/// Sample from the combined stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedSample {
    pub timestamp: f64,
    pub value: f64,
    pub origin: Origin,
}

impl MergedSample {
    fn tagged(sample: Sample, origin: Origin) -> Self {
        Self {
            timestamp: sample.timestamp,
            value: sample.value,
            origin,
        }
    }
}

/// What to do with the rest of one stream once the other runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Emit the remaining samples, each tagged with its own sensor
    #[default]
    Flush,
    /// Stop at the first exhausted stream and drop the other's tail
    Truncate,
}

/// Lazy merge of two ordered sample streams
///
/// Needs one sample of lookahead per input and nothing else.
pub struct MergedStream<A: Iterator<Item = Sample>, B: Iterator<Item = Sample>> {
    first: Peekable<A>,
    second: Peekable<B>,
    policy: MergePolicy,
    // Sensor 2 half of a coincident pair, emitted on the next call
    pending: Option<MergedSample>,
    done: bool,
}

impl<A: Iterator<Item = Sample>, B: Iterator<Item = Sample>> MergedStream<A, B> {
    /// # Arguments
    /// * `first` - Sensor 1 samples, non-decreasing in timestamp
    /// * `second` - Sensor 2 samples, non-decreasing in timestamp
    /// * `policy` - Handling of the longer stream's tail
    pub fn new<I, J>(first: I, second: J, policy: MergePolicy) -> Self
    where
        I: IntoIterator<IntoIter = A>,
        J: IntoIterator<IntoIter = B>,
    {
        Self {
            first: first.into_iter().peekable(),
            second: second.into_iter().peekable(),
            policy,
            pending: None,
            done: false,
        }
    }

    fn take_first(&mut self, origin: Origin) -> Option<MergedSample> {
        self.first.next().map(|s| MergedSample::tagged(s, origin))
    }

    fn take_second(&mut self, origin: Origin) -> Option<MergedSample> {
        self.second.next().map(|s| MergedSample::tagged(s, origin))
    }
}

impl<A: Iterator<Item = Sample>, B: Iterator<Item = Sample>> Iterator for MergedStream<A, B> {
    type Item = MergedSample;

    fn next(&mut self) -> Option<MergedSample> {
        if let Some(sample) = self.pending.take() {
            return Some(sample);
        }
        if self.done {
            return None;
        }

        let front_first = self.first.peek().map(|s| s.timestamp);
        let front_second = self.second.peek().map(|s| s.timestamp);

        match (front_first, front_second) {
            (Some(ts1), Some(ts2)) => {
                if ts1 < ts2 {
                    self.take_first(Origin::Sensor1)
                } else if ts2 < ts1 {
                    self.take_second(Origin::Sensor2)
                } else {
                    self.pending = self.take_second(Origin::Both);
                    self.take_first(Origin::Both)
                }
            }
            (None, None) => {
                self.done = true;
                None
            }
            _ if self.policy == MergePolicy::Truncate => {
                self.done = true;
                None
            }
            (Some(_), None) => self.take_first(Origin::Sensor1),
            (None, Some(_)) => self.take_second(Origin::Sensor2),
        }
    }
}

/// Merge two ordered sample slices into one ordered, origin-tagged stream
pub fn merge_streams(first: &[Sample], second: &[Sample], policy: MergePolicy) -> Vec<MergedSample> {
    let mut merged = Vec::with_capacity(first.len() + second.len());
    merged.extend(MergedStream::new(
        first.iter().copied(),
        second.iter().copied(),
        policy,
    ));
    merged
}
