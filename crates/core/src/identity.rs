//! Ecuadorian national identity number (cédula) validation.
//!
//! A natural-person cédula is ten digits: a two-digit province code
//! (01–24), a third digit below 6, and a mod-10 weighted checksum in the
//! last position. Quotations require a valid cédula before export; an
//! invalid one is a local input correction, never a hard failure.

/// Validates an Ecuadorian cédula for natural persons.
///
/// Returns `false` for anything that is not exactly ten digits, has an
/// out-of-range province, a person-type digit of 6 or above, or a failing
/// checksum.
pub fn validate_cedula(cedula: &str) -> bool {
    let digits: Vec<u32> = cedula.trim().chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 10 || cedula.trim().chars().count() != 10 {
        return false;
    }

    let province = digits[0] * 10 + digits[1];
    if !(1..=24).contains(&province) {
        return false;
    }
    // Third digit >= 6 marks juridical/public entities, not natural persons.
    if digits[2] > 5 {
        return false;
    }

    let mut sum = 0;
    for (i, &digit) in digits.iter().take(9).enumerate() {
        if i % 2 == 0 {
            let mut doubled = digit * 2;
            if doubled > 9 {
                doubled -= 9;
            }
            sum += doubled;
        } else {
            sum += digit;
        }
    }
    let residue = sum % 10;
    let check_digit = if residue == 0 { 0 } else { 10 - residue };
    check_digit == digits[9]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_cedula() {
        // Province 17 (Pichincha), natural person, correct check digit.
        assert!(validate_cedula("1710034065"));
    }

    #[test]
    fn test_accepts_surrounding_whitespace() {
        assert!(validate_cedula(" 1710034065 "));
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(!validate_cedula("171003406"));
        assert!(!validate_cedula("17100340655"));
        assert!(!validate_cedula(""));
    }

    #[test]
    fn test_rejects_non_digits() {
        assert!(!validate_cedula("17100340a5"));
    }

    #[test]
    fn test_rejects_invalid_province() {
        assert!(!validate_cedula("0010034065"));
        assert!(!validate_cedula("2510034065"));
    }

    #[test]
    fn test_rejects_juridical_third_digit() {
        assert!(!validate_cedula("1760034065"));
    }

    #[test]
    fn test_rejects_bad_check_digit() {
        assert!(!validate_cedula("1710034066"));
    }
}
