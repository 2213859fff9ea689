//! # Two-line text format
//!
//! Formatting and parsing of the two 69-character element-set lines.
//!
//! Line 1 (0-based columns):
//!
//! ```text
//! 0      2     7 9        18             33         44       53       62 64  68
//! 1 NNNNNU IIIIIIII YYDDD.DDDDDDDD +.NNNNNNNN +NNNNN-N +NNNNN-N T EEEEC
//! ```
//!
//! Line 2:
//!
//! ```text
//! 0      8        17       26      34       43       52         63   68
//! 2 NNNNN III.IIII RRR.RRRR EEEEEEE PPP.PPPP MMM.MMMM NN.NNNNNNNNRRRRRC
//! ```
//!
//! The checksum column `C` is always written as `0`; it is not verified on input.
//!
//! Implied-decimal fields (`nddot`, `bstar`) store `±0.MMMMM × 10^E` as a sign, a five-digit
//! mantissa and a signed one-digit exponent; an exponent of zero is written `-0`. Magnitudes
//! beyond [`MAX_IMPLIED_DECIMAL`] are written as that bound, and `ndot` saturates at
//! `±.99999999`, so both lines always stay 69 characters wide.

use crate::{
    element_set::{draft::ElementSetDraft, ElementSet, ElementType},
    time::{format_element_epoch, parse_element_epoch},
    tlefit_errors::TleFitError,
};

/// Largest magnitude an implied-decimal field holds, `+99999+9`.
pub const MAX_IMPLIED_DECIMAL: f64 = 0.99999e9;

/// Render a value in the implied-decimal notation, e.g. `8.9211e-5` → `+89211-4`.
pub fn format_implied_decimal(val: f64) -> String {
    let sign = if val < 0.0 { '-' } else { '+' };
    let av = if val.is_nan() { 0.0 } else { val.abs() };
    if av >= MAX_IMPLIED_DECIMAL {
        return format!("{sign}99999+9");
    }

    let mut exp: i32 = if av < 1e-9 {
        -9
    } else {
        av.log10().floor() as i32
    };
    let mut mantissa = (av * 10f64.powi(5 - exp)).round() as u64;
    while mantissa > 99_999 {
        exp += 1;
        mantissa = (av * 10f64.powi(5 - exp)).round() as u64;
    }
    if mantissa == 0 {
        exp = 0;
    }

    let ex = if exp > 0 {
        format!("+{exp}")
    } else if exp == 0 {
        "-0".to_string()
    } else {
        exp.to_string()
    };
    format!("{sign}{mantissa:05}{ex}")
}

/// Parse an implied-decimal field (`-11606-4`, ` 00000+0`, `+89211-4`).
pub fn parse_implied_decimal(field: &str) -> Result<f64, TleFitError> {
    let err = || TleFitError::MalformedElementSet(format!("bad implied decimal: '{field}'"));
    let s = field.trim();
    if s.len() < 3 || !s.is_char_boundary(s.len() - 2) {
        return Err(err());
    }
    let (mant, exp) = s.split_at(s.len() - 2);
    let exp: i32 = exp.parse().map_err(|_| err())?;

    let (negative, digits) = match mant.as_bytes().first() {
        Some(b'-') => (true, &mant[1..]),
        Some(b'+') => (false, &mant[1..]),
        _ => (false, mant),
    };
    let digits = digits.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    let mantissa: f64 = digits.parse().map_err(|_| err())?;
    let value = mantissa / 10f64.powi(digits.len() as i32) * 10f64.powi(exp);
    Ok(if negative { -value } else { value })
}

/// Render the first mean-motion derivative as `±.NNNNNNNN`.
pub fn format_ndot(val: f64) -> String {
    let sign = if val < 0.0 { '-' } else { '+' };
    let digits = format!("{:.8}", val.abs());
    // drop the leading zero of "0.xxxxxxxx"
    match digits.strip_prefix('0') {
        Some(frac) => format!("{sign}{frac}"),
        None => format!("{sign}.99999999"),
    }
}

fn right_aligned(s: &str, width: usize) -> String {
    format!("{s:>width$}")
}

pub fn format_line1(set: &ElementSet) -> String {
    format!(
        "1 {}U {:<8} {} {} {} {} {} {}0",
        right_aligned(&set.object_id, 5),
        set.intl_id,
        format_element_epoch(&set.epoch),
        format_ndot(set.ndot),
        format_implied_decimal(set.nddot),
        format_implied_decimal(set.bstar),
        set.element_type.digit(),
        right_aligned(&set.element_number.to_string(), 4),
    )
}

pub fn format_line2(set: &ElementSet) -> String {
    let ecc = format!("{:.7}", set.eccentricity);
    format!(
        "2 {} {:08.4} {:08.4} {} {:08.4} {:08.4} {:011.8}{}0",
        right_aligned(&set.object_id, 5),
        set.inclination,
        set.raan,
        ecc.get(2..).unwrap_or("0000000"),
        set.arg_perigee,
        set.mean_anomaly,
        set.mean_motion,
        right_aligned(&set.rev_number.to_string(), 5),
    )
}

fn column<'a>(line: &'a str, start: usize, end: usize) -> &'a str {
    let end = end.min(line.len());
    line.get(start..end).unwrap_or("")
}

fn required<T: std::str::FromStr>(
    line: &str,
    start: usize,
    end: usize,
    name: &str,
) -> Result<T, TleFitError> {
    let field = column(line, start, end).trim();
    field.parse().map_err(|_| {
        TleFitError::MalformedElementSet(format!("cannot read {name} from '{field}'"))
    })
}

fn optional<T: std::str::FromStr + Default>(line: &str, start: usize, end: usize) -> T {
    column(line, start, end).trim().parse().unwrap_or_default()
}

/// Read the columns of a line pair into a draft.
///
/// Return
/// ------
/// * `Err(TleFitError::MalformedElementSet)` if the line markers are wrong or a mandatory
///   field (epoch, angles, eccentricity, mean motion, derivative terms) cannot be parsed.
///   Element number, element type and revolution number default to zero when blank.
pub fn parse_lines(line1: &str, line2: &str) -> Result<ElementSetDraft, TleFitError> {
    if !line1.starts_with("1 ") || !line2.starts_with("2 ") {
        return Err(TleFitError::MalformedElementSet(
            "lines must start with '1 ' and '2 '".into(),
        ));
    }

    let object_id = column(line1, 2, 7).trim();
    let epoch = parse_element_epoch(column(line1, 18, 32))?;

    let ecc_digits = column(line2, 26, 33).trim();
    let eccentricity: f64 = format!("0.{ecc_digits}").parse().map_err(|_| {
        TleFitError::MalformedElementSet(format!("cannot read eccentricity from '{ecc_digits}'"))
    })?;

    let draft = ElementSetDraft::new(object_id, epoch)
        .intl_id(column(line1, 9, 17))
        .ndot(required(line1, 33, 43, "ndot")?)
        .nddot(parse_implied_decimal(column(line1, 44, 52))?)
        .bstar(parse_implied_decimal(column(line1, 53, 61))?)
        .element_type(ElementType::from_digit(optional(line1, 62, 63)))
        .element_number(optional(line1, 64, 68))
        .inclination(required(line2, 8, 16, "inclination")?)
        .raan(required(line2, 17, 25, "raan")?)
        .eccentricity(eccentricity)
        .arg_perigee(required(line2, 34, 42, "argument of perigee")?)
        .mean_anomaly(required(line2, 43, 51, "mean anomaly")?)
        .mean_motion(required(line2, 52, 63, "mean motion")?)
        .rev_number(optional(line2, 63, 68));

    Ok(draft)
}

#[cfg(test)]
mod test_tle_format {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_format_implied_decimal() {
        assert_eq!(format_implied_decimal(8.9211e-5), "+89211-4");
        assert_eq!(format_implied_decimal(-1.1606e-5), "-11606-4");
        assert_eq!(format_implied_decimal(0.0), "+00000-0");
        assert_eq!(format_implied_decimal(1e-12), "+00000-0");
        assert_eq!(format_implied_decimal(0.5), "+50000-0");
        assert_eq!(format_implied_decimal(5.0), "+50000+1");
        assert_eq!(format_implied_decimal(1e-5), "+10000-4");
    }

    #[test]
    fn test_implied_decimal_saturates() {
        assert_eq!(format_implied_decimal(0.98765e9), "+98765+9");
        assert_eq!(format_implied_decimal(0.999996e9), "+99999+9");
        assert_eq!(format_implied_decimal(3.16e9), "+99999+9");
        assert_eq!(format_implied_decimal(-1e12), "-99999+9");
        assert_eq!(format_implied_decimal(f64::INFINITY), "+99999+9");
        assert_eq!(format_implied_decimal(f64::NAN), "+00000-0");
        assert_relative_eq!(parse_implied_decimal("+99999+9").unwrap(), MAX_IMPLIED_DECIMAL);
    }

    #[test]
    fn test_parse_implied_decimal() {
        assert_relative_eq!(parse_implied_decimal("+89211-4").unwrap(), 8.9211e-5);
        assert_relative_eq!(parse_implied_decimal("-11606-4").unwrap(), -1.1606e-5);
        assert_eq!(parse_implied_decimal(" 00000+0").unwrap(), 0.0);
        assert_relative_eq!(parse_implied_decimal(" 12345-3").unwrap(), 1.2345e-4);
        assert!(parse_implied_decimal("abc").is_err());
        assert!(parse_implied_decimal("+1a345-3").is_err());
    }

    #[test]
    fn test_format_ndot() {
        assert_eq!(format_ndot(1.34e-6), "+.00000134");
        assert_eq!(format_ndot(-0.1), "-.10000000");
        assert_eq!(format_ndot(0.0), "+.00000000");
        assert_eq!(format_ndot(0.999999999), "+.99999999");
        assert_eq!(format_ndot(-1.0), "-.99999999");
    }

    #[test]
    fn test_bad_lines() {
        assert!(parse_lines("x", "y").is_err());
        let l1 = "1 41085U XYXYX    19001.50315140 +.00000134 +00000-0 +89211-4 0  9990";
        assert!(parse_lines(l1, "2 41085 098.8407").is_err());
    }
}
