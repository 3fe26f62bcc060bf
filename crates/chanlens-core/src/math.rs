//! Rounding and ratio helpers shared by the staging, dimension and fact
//! builders. Every derived rate in the warehouse goes through these so that
//! recomputation in the consistency checks is exact.

/// Round `value` to `places` decimal places, half away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
  let factor = 10f64.powi(places);
  (value * factor).round() / factor
}

pub fn round2(value: f64) -> f64 { round_to(value, 2) }

/// `part / whole × 100`, rounded to two places; 0 when `whole` is 0.
pub fn rate(part: i64, whole: i64) -> f64 {
  if whole == 0 {
    return 0.0;
  }
  round2(part as f64 / whole as f64 * 100.0)
}

/// Arithmetic mean rounded to two places; 0 for an empty population.
pub fn mean(total: i64, count: i64) -> f64 {
  if count == 0 {
    return 0.0;
  }
  round2(total as f64 / count as f64)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rate_guards_zero_denominator() {
    assert_eq!(rate(5, 0), 0.0);
    assert_eq!(rate(0, 0), 0.0);
  }

  #[test]
  fn rate_rounds_to_two_places() {
    assert_eq!(rate(5, 100), 5.0);
    assert_eq!(rate(1, 3), 33.33);
    assert_eq!(rate(2, 3), 66.67);
  }

  #[test]
  fn mean_of_empty_population_is_zero() {
    assert_eq!(mean(10, 0), 0.0);
    assert_eq!(mean(10, 4), 2.5);
  }

  #[test]
  fn round_to_four_places() {
    assert_eq!(round_to(0.123_456, 4), 0.1235);
  }
}
