//! Assembly and scoring of candidate combinations.
//!
//! Both steps are external collaborators: an [`Assembler`] turns one payload per slot into
//! a realized product (or nothing, for an invalid combination), and an [`Evaluator`]
//! scores it. Evaluators report "could not score" as a non-finite value, never as an
//! error. Closures implement both traits.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::SourceError;

/// Builds a realized product from one payload per slot, in slot order.
pub trait Assembler<P, Q> {
    fn assemble(&mut self, parts: &[&P]) -> Option<Q>;
}

impl<P, Q, F> Assembler<P, Q> for F
where
    F: FnMut(&[&P]) -> Option<Q>,
{
    fn assemble(&mut self, parts: &[&P]) -> Option<Q> {
        self(parts)
    }
}

/// Scores a realized product.
///
/// `name` is the stable combination identifier (element names joined by `_`), which
/// lookup-backed evaluators key on.
pub trait Evaluator<Q> {
    fn evaluate(&mut self, product: &Q, name: &str) -> f64;
}

impl<Q, F> Evaluator<Q> for F
where
    F: FnMut(&Q, &str) -> f64,
{
    fn evaluate(&mut self, product: &Q, name: &str) -> f64 {
        self(product, name)
    }
}

/// Joins string payloads with a separator.
///
/// An empty payload marks an element that cannot take part in any product, so assembly
/// fails for every combination containing it.
#[derive(Debug, Clone)]
pub struct JoinAssembler {
    pub separator: String,
}

impl Default for JoinAssembler {
    fn default() -> Self {
        Self {
            separator: ".".to_string(),
        }
    }
}

impl Assembler<String, String> for JoinAssembler {
    fn assemble(&mut self, parts: &[&String]) -> Option<String> {
        if parts.is_empty() || parts.iter().any(|p| p.trim().is_empty()) {
            return None;
        }
        let joined: Vec<&str> = parts.iter().map(|p| p.as_str()).collect();
        Some(joined.join(&self.separator))
    }
}

/// Scores combinations by looking their identifier up in a precomputed table.
///
/// Misses score `NaN`.
#[derive(Debug, Clone, Default)]
pub struct LookupEvaluator {
    scores: HashMap<String, f64>,
}

impl LookupEvaluator {
    pub fn new(scores: HashMap<String, f64>) -> Self {
        Self { scores }
    }

    /// Load a `name,score` table. A header line whose score column does not parse is
    /// skipped; blank lines and `#` comments are ignored.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SourceError::Read {
            source,
            path: path.to_path_buf(),
        })?;
        let mut scores = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, score)) = line.rsplit_once(',') else {
                return Err(SourceError::Malformed {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    message: "expected `name,score`".to_string(),
                });
            };
            match score.trim().parse::<f64>() {
                Ok(v) => {
                    scores.insert(name.trim().to_string(), v);
                }
                Err(_) if lineno == 0 => {}
                Err(e) => {
                    return Err(SourceError::Malformed {
                        path: path.to_path_buf(),
                        line: lineno + 1,
                        message: format!("bad score {score:?}: {e}"),
                    })
                }
            }
        }
        Ok(Self { scores })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl<Q> Evaluator<Q> for LookupEvaluator {
    fn evaluate(&mut self, _product: &Q, name: &str) -> f64 {
        self.scores.get(name).copied().unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn join_assembler_joins_and_rejects_blank() {
        let mut a = JoinAssembler::default();
        let (x, y, blank) = ("CCO".to_string(), "N".to_string(), " ".to_string());
        assert_eq!(a.assemble(&[&x, &y]), Some("CCO.N".to_string()));
        assert_eq!(a.assemble(&[&x, &blank]), None);
    }

    #[test]
    fn closures_are_collaborators() {
        let mut asm = |parts: &[&usize]| -> Option<usize> { Some(parts.iter().copied().sum()) };
        let mut ev = |q: &usize, _name: &str| *q as f64 * 2.0;
        let q = asm.assemble(&[&1, &2]).unwrap();
        assert_eq!(Evaluator::evaluate(&mut ev, &q, "a_b"), 6.0);
    }

    #[test]
    fn lookup_reads_table_and_misses_are_nan() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "name,score").unwrap();
        writeln!(f, "a_x,1.5").unwrap();
        writeln!(f, "# comment").unwrap();
        writeln!(f, "b_y, -2").unwrap();
        let mut ev = LookupEvaluator::from_path(f.path()).unwrap();
        assert_eq!(ev.len(), 2);
        assert_eq!(Evaluator::<()>::evaluate(&mut ev, &(), "a_x"), 1.5);
        assert_eq!(Evaluator::<()>::evaluate(&mut ev, &(), "b_y"), -2.0);
        assert!(Evaluator::<()>::evaluate(&mut ev, &(), "c_z").is_nan());
    }

    #[test]
    fn lookup_rejects_bad_rows() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "a_x,1.0").unwrap();
        writeln!(f, "b_y,oops").unwrap();
        let err = LookupEvaluator::from_path(f.path()).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { line: 2, .. }));
    }
}
