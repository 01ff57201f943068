//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use cgmath::num_traits::Float;

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: std::cmp::PartialOrd> Interval<T> {
    /// Returns true if this interval overlaps with the other.
    /// Intervals that only share an end point do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.max > other.min && other.max > self.min
    }

    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    /// Returns true if `min <= max`.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

impl<T: std::ops::Sub<T, Output = T> + Copy> Interval<T> {
    /// Gets the magnitude of the interval.
    pub fn length(&self) -> T {
        self.max - self.min
    }
}

impl<T: Copy> Interval<T> {
    /// Gets the interval as an array.
    pub fn as_array(&self) -> [T; 2] {
        [self.min, self.max]
    }
}

impl<T: Float> Interval<T> {
    /// Returns the centre/mid-point of the interval.
    pub fn midpoint(&self) -> T {
        T::from(0.5).unwrap() * (self.min + self.max)
    }

    /// Clamps a value into the interval.
    pub fn clamp(&self, value: T) -> T {
        value.max(self.min).min(self.max)
    }

    /// Shrinks the interval by `amount` at both ends.
    pub fn shrink(&self, amount: T) -> Self {
        Self {
            min: self.min + amount,
            max: self.max - amount,
        }
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

#[cfg(test)]
mod test {
    use super::Interval;

    #[test]
    fn overlap_excludes_touching() {
        let a = Interval::new(0.0, 10.0);
        assert!(a.overlaps(&Interval::new(5.0, 15.0)));
        assert!(!a.overlaps(&Interval::new(10.0, 15.0)));
        assert!(!Interval::new(10.0, 15.0).overlaps(&a));
    }

    #[test]
    fn clamp_and_shrink() {
        let a = Interval::new(50.0, 350.0);
        assert_eq!(a.clamp(400.0), 350.0);
        assert_eq!(a.clamp(-1.0), 50.0);
        assert_eq!(a.clamp(120.0), 120.0);
        assert_eq!(a.shrink(15.0), Interval::new(65.0, 335.0));
        assert_eq!(a.midpoint(), 200.0);
    }
}
