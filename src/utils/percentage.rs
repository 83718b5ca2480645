use std::{fmt::Display, ops::Deref};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. || value.is_nan() {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `value` seconds in `whole` seconds. An empty whole gives 0%.
pub fn seconds_percentage(value: i64, whole: i64) -> Percentage {
    if whole <= 0 {
        return Percentage(0.);
    }
    Percentage::new_opt(value.max(0) as f64 / whole as f64 * 100.).unwrap_or(Percentage(0.))
}

#[cfg(test)]
mod tests {
    use super::{seconds_percentage, Percentage};

    #[test]
    fn test_seconds_percentage() {
        assert_eq!(*seconds_percentage(30, 120), 25.);
        assert_eq!(*seconds_percentage(30, 0), 0.);
    }

    #[test]
    fn test_negative_is_rejected() {
        assert_eq!(Percentage::new_opt(-1.), None);
        assert_eq!(Percentage::new_opt(12.5).unwrap().to_string(), "12.5%");
    }
}
