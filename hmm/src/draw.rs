//! Graphviz export of a model's structure
use crate::error::Result;
use crate::hmm::Hmm;
use crate::opdf::Opdf;
use std::fmt::{self, Display};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Renders an [`Hmm`] as a Graphviz `dot` digraph.
///
/// Transitions below `minimum_aij` are omitted. States whose initial
/// probability reaches `minimum_pi` are drawn as double circles labelled
/// with that probability.
///
/// # Example
/// ```rust
/// use hmm::{DotDrawer, Hmm, OpdfDiscrete};
///
/// let hmm = Hmm::new(2, OpdfDiscrete::uniform(2).unwrap()).unwrap();
/// let dot = DotDrawer::default().draw(&hmm);
/// assert!(dot.starts_with("digraph {"));
/// assert!(dot.contains("0 -> 1 [label=0.5];"));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DotDrawer {
    minimum_aij: f64,
    minimum_pi: f64,
}

impl Default for DotDrawer {
    fn default() -> Self {
        Self {
            minimum_aij: 0.01,
            minimum_pi: 0.01,
        }
    }
}

/// At most two fraction digits, without trailing zeros.
fn probability(p: f64) -> String {
    let s = format!("{p:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

impl DotDrawer {
    /// Hide transitions whose probability is below `minimum_aij`.
    #[must_use]
    pub fn with_minimum_aij(self, minimum_aij: f64) -> Self {
        Self {
            minimum_aij,
            ..self
        }
    }

    /// Highlight states whose initial probability reaches `minimum_pi`.
    #[must_use]
    pub fn with_minimum_pi(self, minimum_pi: f64) -> Self {
        Self { minimum_pi, ..self }
    }

    /// Transition threshold.
    #[must_use]
    pub fn minimum_aij(&self) -> f64 {
        self.minimum_aij
    }

    /// Initial-probability threshold.
    #[must_use]
    pub fn minimum_pi(&self) -> f64 {
        self.minimum_pi
    }

    /// A [`Display`] view of `hmm` as a `dot` digraph.
    #[must_use]
    pub fn graph<'a, D: Opdf + Display>(
        &'a self,
        hmm: &'a Hmm<D>,
    ) -> DotGraph<'a, D> {
        DotGraph { drawer: self, hmm }
    }

    /// The `dot` description of `hmm`.
    #[must_use]
    pub fn draw<D: Opdf + Display>(&self, hmm: &Hmm<D>) -> String {
        self.graph(hmm).to_string()
    }

    /// Write the `dot` description of `hmm` to `writer`.
    ///
    /// # Errors
    /// `Io` if `writer` fails.
    pub fn write<D: Opdf + Display, W: Write>(
        &self,
        mut writer: W,
        hmm: &Hmm<D>,
    ) -> Result<()> {
        write!(writer, "{}", self.graph(hmm))?;
        Ok(())
    }

    /// Write the `dot` description of `hmm` to the file at `path`.
    ///
    /// # Errors
    /// `Io` if the file cannot be created or written.
    pub fn write_file<D: Opdf + Display, P: AsRef<Path>>(
        &self,
        path: P,
        hmm: &Hmm<D>,
    ) -> Result<()> {
        let mut writer = io::BufWriter::new(File::create(path)?);
        self.write(&mut writer, hmm)?;
        writer.flush()?;
        Ok(())
    }
}

/// An [`Hmm`] paired with the [`DotDrawer`] settings used to display it.
pub struct DotGraph<'a, D> {
    drawer: &'a DotDrawer,
    hmm: &'a Hmm<D>,
}

impl<D: Opdf + Display> Display for DotGraph<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.hmm.nb_states();
        writeln!(f, "digraph {{")?;

        for i in 0..n {
            for j in 0..n {
                let aij = self.hmm.aij(i, j);
                if aij >= self.drawer.minimum_aij {
                    writeln!(
                        f,
                        "\t{i} -> {j} [label={}];",
                        probability(aij)
                    )?;
                }
            }
        }

        for i in 0..n {
            let pi = self.hmm.pi(i);
            let opdf = self.hmm.opdf(i);
            if pi >= self.drawer.minimum_pi {
                writeln!(
                    f,
                    "\t{i} [shape=doublecircle, label=\"{i} - Pi= {} - [ {opdf} ]\"];",
                    probability(pi)
                )?;
            } else {
                writeln!(
                    f,
                    "\t{i} [shape=circle, label=\"{i} - [ {opdf} ]\"];"
                )?;
            }
        }

        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HmmError;
    use crate::opdf::OpdfGaussian;
    use ndarray::array;

    fn model() -> Hmm<OpdfGaussian> {
        Hmm::from_parts(
            array![1.0, 0.0],
            array![[0.993, 0.007], [0.25, 0.75]],
            vec![
                OpdfGaussian::new(0.0, 1.0).unwrap(),
                OpdfGaussian::new(3.0, 2.0).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn probabilities_are_rounded() {
        assert_eq!(probability(0.5), "0.5");
        assert_eq!(probability(0.996), "1");
        assert_eq!(probability(0.123), "0.12");
        assert_eq!(probability(0.0), "0");
    }

    #[test]
    fn small_transitions_are_hidden() {
        let dot = DotDrawer::default().draw(&model());
        assert!(dot.contains("\t0 -> 0 [label=0.99];"));
        assert!(!dot.contains("0 -> 1"));
        assert!(dot.contains("\t1 -> 0 [label=0.25];"));
        assert!(dot.contains("\t1 -> 1 [label=0.75];"));

        let dot = DotDrawer::default().with_minimum_aij(0.001).draw(&model());
        assert!(dot.contains("\t0 -> 1 [label=0.01];"));
    }

    #[test]
    fn initial_states_are_highlighted() {
        let dot = DotDrawer::default().draw(&model());
        assert!(dot
            .contains("\t0 [shape=doublecircle, label=\"0 - Pi= 1 - [ "));
        assert!(dot.contains("\t1 [shape=circle, label=\"1 - [ "));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn graph_displays_like_draw() {
        let drawer = DotDrawer::default().with_minimum_pi(0.5);
        let m = model();
        assert_eq!(format!("{}", drawer.graph(&m)), drawer.draw(&m));

        let mut buf = Vec::new();
        drawer.write(&mut buf, &m).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), drawer.draw(&m));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_file_reports_full_disk() {
        let res = DotDrawer::default().write_file("/dev/full", &model());
        assert!(matches!(res, Err(HmmError::Io(_))));
    }
}
