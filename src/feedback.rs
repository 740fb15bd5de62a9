use crate::error::{ClientError, Result};

pub const MAX_STARS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: u8) -> Result<Self> {
        if (1..=MAX_STARS).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ClientError::InvalidRating(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// The five stars under a received message. Star `i` (1-based) is active
/// when `i <= value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StarRow {
    value: u8,
}

impl StarRow {
    pub fn from_feedback(feedback: i64) -> Self {
        Self {
            value: feedback.clamp(0, i64::from(MAX_STARS)) as u8,
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn is_active(&self, star: u8) -> bool {
        star >= 1 && star <= self.value
    }

    pub fn stars(&self) -> [bool; MAX_STARS as usize] {
        let mut out = [false; MAX_STARS as usize];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.is_active(i as u8 + 1);
        }
        out
    }

    pub fn apply(&mut self, rating: Rating) {
        self.value = rating.get();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(1).unwrap().get(), 1);
        assert_eq!(Rating::new(5).unwrap().get(), 5);
    }

    #[test]
    fn stored_feedback_is_clamped() {
        assert_eq!(StarRow::from_feedback(9).value(), 5);
        assert_eq!(StarRow::from_feedback(300).value(), 5);
        assert_eq!(StarRow::from_feedback(-1).stars(), [false; 5]);
        assert_eq!(StarRow::from_feedback(0).stars(), [false; 5]);
    }

    #[test]
    fn applying_a_rating_is_monotonic_around_the_clicked_star() {
        let mut row = StarRow::from_feedback(5);
        row.apply(Rating::new(3).unwrap());
        assert_eq!(row.stars(), [true, true, true, false, false]);

        row.apply(Rating::new(4).unwrap());
        assert_eq!(row.stars(), [true, true, true, true, false]);

        row.apply(Rating::new(1).unwrap());
        assert_eq!(row.stars(), [true, false, false, false, false]);
    }
}
