//! Compact binary encoding of models and distributions
use crate::error::{HmmError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

/// Encode `value` to `writer`.
///
/// # Errors
/// `Serialization` if `value` cannot be encoded or `writer` fails.
pub fn write_binary<T: Serialize, W: Write>(writer: W, value: &T) -> Result<()> {
    bincode::serialize_into(writer, value)
        .map_err(|err| HmmError::Serialization(err.to_string()))
}

/// Decode a value written by [`write_binary`].
///
/// # Errors
/// `Serialization` if the bytes do not describe a `T`.
pub fn read_binary<T: DeserializeOwned, R: Read>(reader: R) -> Result<T> {
    bincode::deserialize_from(reader)
        .map_err(|err| HmmError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::Hmm;
    use crate::opdf::{OpdfDiscrete, OpdfGaussian};
    use ndarray::array;

    #[test]
    fn model_survives_encoding() {
        let hmm = Hmm::from_parts(
            array![0.25, 0.75],
            array![[0.9, 0.1], [0.3, 0.7]],
            vec![
                OpdfGaussian::new(-1.0, 0.5).unwrap(),
                OpdfGaussian::new(2.0, 1.5).unwrap(),
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        write_binary(&mut buf, &hmm).unwrap();
        let back: Hmm<OpdfGaussian> = read_binary(buf.as_slice()).unwrap();

        assert_eq!(back.pis(), hmm.pis());
        assert_eq!(back.transitions(), hmm.transitions());
        assert::close(back.opdf(1).mean(), 2.0, 1E-12);
        assert::close(back.opdf(1).variance(), 1.5, 1E-12);
        let seq = [0.3, -1.2, 2.5];
        assert::close(
            back.ln_probability(&seq).unwrap(),
            hmm.ln_probability(&seq).unwrap(),
            1E-12,
        );
    }

    #[test]
    fn truncated_input_is_an_error() {
        let hmm = Hmm::new(3, OpdfDiscrete::uniform(4).unwrap()).unwrap();
        let mut buf = Vec::new();
        write_binary(&mut buf, &hmm).unwrap();
        buf.truncate(buf.len() / 2);
        let res: Result<Hmm<OpdfDiscrete>> = read_binary(buf.as_slice());
        assert!(matches!(res, Err(HmmError::Serialization(_))));
    }
}
