//! Observed spectra: a wavelength axis and one spectrum per time sample.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::{Result, SpectraFitError};

/// A matrix of spectra (samples × wavelength bins) on a shared wavelength axis.
#[derive(Debug, Clone)]
pub struct Spectra {
    wavelength: Array1<f64>,
    data: Array2<f64>,
}

impl Spectra {
    /// Create from a wavelength axis and a 2-D data array.
    ///
    /// The data may be given as samples × bins or bins × samples; it is
    /// transposed when only the second reading matches the axis length.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` if the axis is not finite and strictly increasing
    /// * `DimensionMismatch` if no data dimension matches the axis
    pub fn new(wavelength: Array1<f64>, data: Array2<f64>) -> Result<Self> {
        validate_axis(&wavelength)?;
        let n = wavelength.len();
        let data = if data.ncols() == n {
            data
        } else if data.nrows() == n {
            data.reversed_axes()
        } else {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "data shape {:?} does not match a wavelength axis of length {}",
                data.shape(),
                n
            )));
        };
        if data.nrows() == 0 {
            return Err(SpectraFitError::InvalidInput(
                "at least one spectrum is required".to_string(),
            ));
        }
        Ok(Self { wavelength, data })
    }

    /// Wrap a single spectrum as a one-sample batch.
    pub fn single(wavelength: Array1<f64>, spectrum: Array1<f64>) -> Result<Self> {
        let data = spectrum.insert_axis(Axis(0));
        Self::new(wavelength, data)
    }

    pub fn wavelength(&self) -> &Array1<f64> {
        &self.wavelength
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn sample(&self, index: usize) -> ArrayView1<'_, f64> {
        self.data.row(index)
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_bins(&self) -> usize {
        self.wavelength.len()
    }
}

fn validate_axis(wavelength: &Array1<f64>) -> Result<()> {
    if wavelength.len() < 2 {
        return Err(SpectraFitError::InvalidInput(
            "wavelength axis needs at least two bins".to_string(),
        ));
    }
    if wavelength.iter().any(|w| !w.is_finite()) {
        return Err(SpectraFitError::InvalidInput(
            "wavelength axis contains non-finite values".to_string(),
        ));
    }
    if let Some(i) = (1..wavelength.len()).find(|&i| wavelength[i] <= wavelength[i - 1]) {
        return Err(SpectraFitError::InvalidInput(format!(
            "wavelength axis is not strictly increasing at bin {}",
            i
        )));
    }
    Ok(())
}
