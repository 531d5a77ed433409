use crate::error::{Error, Result};

/// A 4D tensor of `f32` samples. Samples are interleaved, channel fastest:
/// `((t * height + y) * width + x) * channels + c`.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    frames: usize,
    channels: usize,
    data: Vec<f32>,
}

impl Image {
    /// Zero filled image.
    pub fn new(width: usize, height: usize, frames: usize, channels: usize) -> Result<Self> {
        let len = sample_count(width, height, frames, channels)?;
        Ok(Self {
            width,
            height,
            frames,
            channels,
            data: vec![0.0; len],
        })
    }

    /// Wrap an existing buffer. The buffer must hold exactly one sample per
    /// (x, y, t, c), nothing is truncated or padded.
    pub fn from_samples(
        width: usize,
        height: usize,
        frames: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self> {
        let len = sample_count(width, height, frames, channels)?;
        if data.len() != len {
            return Err(Error::protocol(format!(
                "{width}x{height}x{frames}x{channels} image needs {len} samples, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            frames,
            channels,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// (width, height, frames, channels)
    pub fn dims(&self) -> (usize, usize, usize, usize) {
        (self.width, self.height, self.frames, self.channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.data
    }

    fn index(&self, x: usize, y: usize, t: usize, c: usize) -> Option<usize> {
        if x >= self.width || y >= self.height || t >= self.frames || c >= self.channels {
            return None;
        }
        Some(((t * self.height + y) * self.width + x) * self.channels + c)
    }

    pub fn get(&self, x: usize, y: usize, t: usize, c: usize) -> Option<f32> {
        self.index(x, y, t, c).map(|i| self.data[i])
    }

    pub fn set(&mut self, x: usize, y: usize, t: usize, c: usize, value: f32) -> bool {
        match self.index(x, y, t, c) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Element-wise `self - other`. `None` if the dimensions differ.
    pub fn difference(&self, other: &Image) -> Option<Image> {
        if self.dims() != other.dims() {
            return None;
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a - b)
            .collect();
        Some(Image {
            width: self.width,
            height: self.height,
            frames: self.frames,
            channels: self.channels,
            data,
        })
    }
}

/// Number of samples for the given dimensions. Each dimension has to be
/// positive and fit the signed 32 bit wire header.
pub(crate) fn sample_count(
    width: usize,
    height: usize,
    frames: usize,
    channels: usize,
) -> Result<usize> {
    for (name, d) in [
        ("width", width),
        ("height", height),
        ("frames", frames),
        ("channels", channels),
    ] {
        if d == 0 || d > i32::MAX as usize {
            return Err(Error::protocol(format!("invalid {name} {d}")));
        }
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(frames))
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| {
            Error::protocol(format!(
                "{width}x{height}x{frames}x{channels} image is too large"
            ))
        })
}
