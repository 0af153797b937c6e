//! Synthetic cosinus source, handy for demos and tests
//!
//! Shape and sampling frequency are selected through the variable metadata,
//! so one source type backs scalar, vector and spectrogram products.

use async_trait::async_trait;
use indexmap::IndexMap;

use ts_core::{DataSeries, TimeRange, Unit};

use crate::provider::{ProgressReporter, SeriesSource};
use crate::DataError;

/// Metadata key selecting the generated shape: scalar, vector, spectrogram.
pub const COSINUS_TYPE_KEY: &str = "cosinusType";
/// Metadata key selecting the sampling frequency, in hertz.
pub const COSINUS_FREQUENCY_KEY: &str = "cosinusFrequency";

const DEFAULT_TYPE: &str = "scalar";
const DEFAULT_FREQUENCY: f64 = 60.0;

/// Samples generated between two progress reports.
const PROGRESS_CHUNK: usize = 4096;

/// Number of bands generated for a spectrogram
const SPECTROGRAM_BAND_COUNT: usize = 30;

/// Bands for which to generate NaN values for a spectrogram
const SPECTROGRAM_NAN_BANDS: [usize; 4] = [1, 3, 10, 20];

/// Bands for which to generate zeros for a spectrogram
const SPECTROGRAM_ZERO_BANDS: [usize; 4] = [2, 15, 19, 29];

enum CosinusShape {
    Scalar,
    Vector,
    Spectrogram { bands: Vec<f64> },
}

impl CosinusShape {
    fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("scalar") {
            Some(Self::Scalar)
        } else if name.eq_ignore_ascii_case("vector") {
            Some(Self::Vector)
        } else if name.eq_ignore_ascii_case("spectrogram") {
            let bands = (0..SPECTROGRAM_BAND_COUNT).map(|band| band as f64).collect();
            Some(Self::Spectrogram { bands })
        } else {
            None
        }
    }

    fn component_count(&self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vector => 3,
            Self::Spectrogram { bands } => bands.len(),
        }
    }

    /// Generates the values of one sample (one value per component).
    fn generate_values(&self, x: f64, values: &mut Vec<f64>) {
        match self {
            Self::Scalar => values.push(x.cos()),
            Self::Vector => {
                let value = x.cos();
                for component in 0..3 {
                    values.push(value / (component + 1) as f64);
                }
            }
            Self::Spectrogram { bands } => {
                for (band, &y) in bands.iter().enumerate() {
                    let value = if SPECTROGRAM_ZERO_BANDS.contains(&band) {
                        0.0
                    } else if SPECTROGRAM_NAN_BANDS.contains(&band) {
                        f64::NAN
                    } else {
                        let r = 3.0 * (x * x + y * y).sqrt() + 1e-2;
                        2.0 * x * ((r + 2.0).cos() / r - (r + 2.0).sin() / r)
                    };
                    values.push(value);
                }
            }
        }
    }

    fn values_unit(&self) -> Unit {
        match self {
            Self::Spectrogram { .. } => Unit::new("eV/(cm^2-s-sr-eV)", false),
            _ => Unit::default(),
        }
    }
}

/// Generates cosinus data over any requested range.
#[derive(Debug, Default, Clone, Copy)]
pub struct CosinusSource;

impl CosinusSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SeriesSource for CosinusSource {
    async fn produce(
        &self,
        range: &TimeRange,
        metadata: &IndexMap<String, String>,
        progress: &ProgressReporter,
    ) -> Result<DataSeries, DataError> {
        let type_name = metadata
            .get(COSINUS_TYPE_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_TYPE);
        let shape = CosinusShape::parse(type_name)
            .ok_or_else(|| DataError::UnsupportedType(type_name.to_string()))?;

        let frequency = match metadata.get(COSINUS_FREQUENCY_KEY) {
            Some(raw) => raw.parse::<f64>().ok().filter(|f| *f > 0.0).ok_or_else(|| {
                DataError::InvalidMetadata {
                    key: COSINUS_FREQUENCY_KEY.to_string(),
                    value: raw.clone(),
                }
            })?,
            None => DEFAULT_FREQUENCY,
        };

        // samples sit on the frequency grid inside the requested range
        let first = (range.start() * frequency).ceil() as i64;
        let last = (range.end() * frequency).floor() as i64;
        let sample_count = (last - first + 1).max(0) as usize;

        let mut x_axis = Vec::with_capacity(sample_count);
        let mut values = Vec::with_capacity(sample_count * shape.component_count());

        for (index, step) in (first..=last).enumerate() {
            let x = step as f64 / frequency;
            x_axis.push(x);
            shape.generate_values(x, &mut values);

            if index % PROGRESS_CHUNK == PROGRESS_CHUNK - 1 {
                progress.report(index as f64 / sample_count as f64);
                // abort point between chunks
                tokio::task::yield_now().await;
            }
        }
        progress.report(1.0);

        Ok(DataSeries::new(
            x_axis,
            values,
            shape.component_count(),
            Unit::new("t", true),
            shape.values_unit(),
        )?)
    }

    fn source_name(&self) -> &str {
        "cosinus"
    }
}
