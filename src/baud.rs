use thiserror::Error;

pub const STANDARD_BAUD_RATES: &[u32] = &[
    110, 300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200, 230400, 250000,
    500000, 1000000, 1500000, 2000000,
];

pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BaudRateError {
    #[error("Please enter a valid number for baud rate.")]
    Invalid(String),
    #[error("This baud rate is already in the list.")]
    Duplicate(u32),
}

/// Standard rates followed by the user's own, in the order they were added.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BaudRates {
    custom: Vec<u32>,
}

impl BaudRates {
    pub fn with_custom(custom: &[u32]) -> Self {
        let mut rates = Self::default();
        for &rate in custom {
            if rate > 0 && !rates.contains(rate) {
                rates.custom.push(rate);
            }
        }
        rates
    }

    pub fn custom(&self) -> &[u32] {
        &self.custom
    }

    pub fn all(&self) -> Vec<u32> {
        STANDARD_BAUD_RATES
            .iter()
            .chain(self.custom.iter())
            .copied()
            .collect()
    }

    pub fn contains(&self, rate: u32) -> bool {
        STANDARD_BAUD_RATES.contains(&rate) || self.custom.contains(&rate)
    }

    pub fn position(&self, rate: u32) -> Option<usize> {
        self.all().iter().position(|r| *r == rate)
    }

    pub fn add_custom(&mut self, text: &str) -> Result<u32, BaudRateError> {
        let text = text.trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BaudRateError::Invalid(text.to_string()));
        }
        let rate: u32 = text
            .parse()
            .map_err(|_| BaudRateError::Invalid(text.to_string()))?;
        if rate == 0 {
            return Err(BaudRateError::Invalid(text.to_string()));
        }
        if self.contains(rate) {
            return Err(BaudRateError::Duplicate(rate));
        }
        self.custom.push(rate);
        tracing::info!(rate, "custom baud rate added");
        Ok(rate)
    }
}
