//! # CPF ephemeris reader
//!
//! Reads the consolidated prediction format used by laser-ranging stations:
//!
//! * an `H2` header (case-insensitive) within the first ten lines carries the international
//!   id (second field) and the object id (fourth field),
//! * `10` records carry `MJD`, seconds of day and the position in metres
//!   (fields 3, 4 and 6–8 once whitespace runs are collapsed).
//!
//! Positions are converted to kilometres; velocities are not part of the records and are
//! left at zero.

use std::{fs, path::Path};

use log::debug;
use nalgebra::Vector3;

use crate::{
    constants::M_TO_KM,
    observations::ObservationSet,
    orbit_type::cartesian_state::CartesianState,
    ref_system::Frame,
    time::epoch_from_mjd_seconds,
    tlefit_errors::TleFitError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CpfEphemeris {
    pub intl_id: Option<String>,
    pub object_id: Option<String>,
    pub observations: ObservationSet,
}

fn parse_record(line: &str) -> Result<CartesianState, TleFitError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let num = |i: usize| -> Result<f64, TleFitError> {
        fields
            .get(i)
            .and_then(|f| f.parse::<f64>().ok())
            .ok_or_else(|| TleFitError::MalformedEphemeris(line.to_string()))
    };

    let epoch = epoch_from_mjd_seconds(num(2)?, num(3)?);
    let position = Vector3::new(num(5)?, num(6)?, num(7)?) * M_TO_KM;
    Ok(CartesianState::new(epoch, position, Vector3::zeros()))
}

/// Parse CPF text.
///
/// Arguments
/// ---------
/// * `text`: file content.
/// * `frame`: frame of the positions (CPF files are normally Earth-fixed).
///
/// Return
/// ------
/// * The identifiers found in the header and the position records, or
///   `Err(TleFitError::MalformedEphemeris)` on the first unreadable `10` record.
pub fn read_cpf(text: &str, frame: Frame) -> Result<CpfEphemeris, TleFitError> {
    let mut intl_id = None;
    let mut object_id = None;

    for line in text.lines().take(10) {
        if line.get(..2).is_some_and(|h| h.eq_ignore_ascii_case("h2")) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            intl_id = fields.get(1).map(|s| s.to_string());
            object_id = fields.get(3).map(|s| s.to_string());
            break;
        }
    }

    let states = text
        .lines()
        .filter(|line| line.starts_with("10"))
        .map(parse_record)
        .collect::<Result<Vec<_>, _>>()?;
    debug!("read {} CPF records for {:?}", states.len(), object_id);

    Ok(CpfEphemeris {
        intl_id,
        object_id,
        observations: ObservationSet::new(frame, states),
    })
}

pub fn read_cpf_from_file(path: impl AsRef<Path>, frame: Frame) -> Result<CpfEphemeris, TleFitError> {
    read_cpf(&fs::read_to_string(path)?, frame)
}

#[cfg(test)]
mod test_cpf_reader {
    use super::*;
    use approx::assert_relative_eq;

    const TEXT: &str = "\
H1 CPF  1  SGF 2021 01 01 00  1 001 lageos1
H2  7603901  1155   8820  2021 01 01 00 00 00  2021 01 09 00 00 00   180 1 1  0 0 0
10 0 59215      0.000000  0      -4912774.270       4520982.403       1345867.408
10 0 59215    180.000000  0      -4995945.953       4631787.077        -20851.315
99
";

    #[test]
    fn test_read_cpf() {
        let cpf = read_cpf(TEXT, Frame::Ecef).unwrap();
        assert_eq!(cpf.intl_id.as_deref(), Some("7603901"));
        assert_eq!(cpf.object_id.as_deref(), Some("8820"));
        assert_eq!(cpf.observations.len(), 2);
        let first = cpf.observations.first().unwrap();
        assert_relative_eq!(first.position.x, -4912.774270, epsilon = 1e-9);
        assert_eq!(cpf.observations.span_seconds(), 180.0);
    }

    #[test]
    fn test_bad_record() {
        let bad = "10 0 59215 abc 0 1 2 3\n";
        assert!(read_cpf(bad, Frame::Ecef).is_err());
    }
}
