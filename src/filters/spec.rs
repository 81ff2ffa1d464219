//! Filter spec grammar
//!
//! ```text
//! spec  := stage ('|' stage)*
//! stage := name ('-' arg)*
//! ```
//!
//! This module only splits the string. Resolving names and validating
//! arguments is the registry's job.

use crate::error::RenditionError;

pub const STAGE_SEPARATOR: char = '|';
pub const ARG_SEPARATOR: char = '-';

/// One `name-arg-arg` stage of a spec, borrowing from the spec string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
    /// The stage exactly as written, for error messages
    pub raw: &'a str,
}

/// Split a spec into its ordered stages
pub fn parse_stages(spec: &str) -> Result<Vec<Stage<'_>>, RenditionError> {
    if spec.is_empty() {
        return Err(RenditionError::invalid_spec(spec, "spec is empty"));
    }

    spec.split(STAGE_SEPARATOR)
        .enumerate()
        .map(|(index, raw)| {
            if raw.is_empty() {
                return Err(RenditionError::invalid_spec(
                    spec,
                    format!("stage {} is empty", index + 1),
                ));
            }

            let mut parts = raw.split(ARG_SEPARATOR);
            let name = parts.next().unwrap_or_default();
            if name.is_empty() {
                return Err(RenditionError::invalid_spec(raw, "missing operation name"));
            }

            Ok(Stage {
                name,
                args: parts.collect(),
                raw,
            })
        })
        .collect()
}

/// Join canonical stages back into a spec string
pub fn join_stages<I, S>(stages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut spec = String::new();
    for (index, stage) in stages.into_iter().enumerate() {
        if index > 0 {
            spec.push(STAGE_SEPARATOR);
        }
        spec.push_str(stage.as_ref());
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_stage_without_args() {
        let stages = parse_stages("original").unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].name, "original");
        assert!(stages[0].args.is_empty());
    }

    #[test]
    fn test_stages_preserve_order() {
        let stages = parse_stages("fill-200x200-c50|format-png|jpegquality-40").unwrap();
        let names: Vec<_> = stages.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["fill", "format", "jpegquality"]);
        assert_eq!(stages[0].args, vec!["200x200", "c50"]);
        assert_eq!(stages[0].raw, "fill-200x200-c50");
    }

    #[test]
    fn test_crop_box_stays_one_argument() {
        let stages = parse_stages("crop-10,10:50,50").unwrap();
        assert_eq!(stages[0].args, vec!["10,10:50,50"]);
    }

    #[test]
    fn test_empty_spec_rejected() {
        let err = parse_stages("").unwrap_err();
        assert!(matches!(err, RenditionError::InvalidFilterSpec { .. }));
    }

    #[test]
    fn test_empty_stage_rejected() {
        assert!(parse_stages("width-200||height-100").is_err());
        assert!(parse_stages("width-200|").is_err());
        assert!(parse_stages("|width-200").is_err());
    }

    #[test]
    fn test_missing_name_rejected() {
        let err = parse_stages("-200").unwrap_err();
        assert!(err.to_string().contains("missing operation name"));
    }

    #[test]
    fn test_trailing_dash_yields_empty_argument() {
        let stages = parse_stages("width-").unwrap();
        assert_eq!(stages[0].args, vec![""]);
    }

    #[test]
    fn test_join_stages() {
        assert_eq!(join_stages(["width-200", "format-png"]), "width-200|format-png");
        assert_eq!(join_stages(Vec::<String>::new()), "");
    }
}
