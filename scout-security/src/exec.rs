//! Shared adapter execution and filtering primitives.
//!
//! Every concrete adapter funnels through here: build the tool invocation
//! (binary or ephemeral container), run it under the configured timeout,
//! classify the exit, and filter findings before anything leaves the adapter.

use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::finding::{Finding, FindingSeverity};
use crate::request::ScanOptions;
use scout_runner::{ContainerSpec, ExecOutput, ExecSpec, ProcessRunner};

/// Build the invocation for a tool, honoring the containerized variant when
/// the config sets an image.
pub fn build_invocation(config: &ScannerConfig, args: &[String]) -> ExecSpec {
    let mut full_args: Vec<String> = args.to_vec();
    full_args.extend(config.extra_args.iter().cloned());

    match &config.image {
        Some(image) => {
            let mut spec = ContainerSpec::new(image).args(full_args);
            for volume in &config.volumes {
                spec.volumes.push(volume.clone());
            }
            for (key, value) in &config.env {
                spec = spec.env(key, value);
            }
            spec.to_exec_spec("docker", config.timeout())
        }
        None => {
            let mut spec = ExecSpec::new(&config.binary)
                .args(full_args)
                .timeout(config.timeout());
            for (key, value) in &config.env {
                spec = spec.env(key, value);
            }
            spec
        }
    }
}

/// Run a tool invocation, mapping runner errors into the scan taxonomy.
pub async fn run_tool(
    runner: &dyn ProcessRunner,
    spec: &ExecSpec,
) -> Result<ExecOutput, ScanError> {
    Ok(runner.run(spec).await?)
}

/// Classify a completed invocation whose output could not be parsed.
///
/// Many security tools signal "findings present" through a non-zero exit, so
/// a non-zero exit alone is not a failure, but a non-zero exit with nothing
/// parseable is. Adapters call this after a parse attempt fails.
pub fn unparseable(scanner: &str, output: &ExecOutput, parse_err: ScanError) -> ScanError {
    if output.success() {
        parse_err
    } else {
        let stderr = output.stderr.trim();
        ScanError::ScannerFailed {
            scanner: scanner.to_string(),
            message: if stderr.is_empty() {
                format!("exit code {} with no parseable output", output.exit_code)
            } else {
                format!("exit code {}: {}", output.exit_code, truncate(stderr, 300))
            },
        }
    }
}

/// Probe a tool binary with `--version`; used by `is_available`.
pub async fn probe_version(
    runner: &dyn ProcessRunner,
    config: &ScannerConfig,
) -> Result<String, ScanError> {
    let spec = build_invocation(config, &["--version".to_string()])
        .timeout(std::time::Duration::from_secs(10));
    let output = runner.run(&spec).await?;
    if !output.success() {
        return Err(ScanError::ScannerUnavailable(config.binary.clone()));
    }
    let version = output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string();
    Ok(version)
}

/// Apply the adapter-local filters: severity allow-list, ignore patterns
/// (matched against the serialized finding), the request's path filters, and
/// the request's severity threshold. Callers past this point never see
/// pre-filter data.
pub fn apply_filters(
    findings: Vec<Finding>,
    config: &ScannerConfig,
    options: &ScanOptions,
) -> Vec<Finding> {
    findings
        .into_iter()
        .filter(|f| severity_allowed(f.severity, config, options))
        .filter(|f| path_allowed(f, options))
        .filter(|f| !matches_ignore_pattern(f, &config.ignore_patterns))
        .collect()
}

fn severity_allowed(
    severity: FindingSeverity,
    config: &ScannerConfig,
    options: &ScanOptions,
) -> bool {
    if !config.allowed_severities.is_empty() && !config.allowed_severities.contains(&severity) {
        return false;
    }
    if let Some(threshold) = options.severity_threshold
        && severity < threshold
    {
        return false;
    }
    true
}

fn path_allowed(finding: &Finding, options: &ScanOptions) -> bool {
    let Some(location) = &finding.location else {
        // Findings without a location (image vulnerabilities) pass path filters.
        return true;
    };
    let path = location.file.to_string_lossy();

    if !options.include_paths.is_empty()
        && !options.include_paths.iter().any(|p| path.contains(p.as_str()))
    {
        return false;
    }
    !options.exclude_paths.iter().any(|p| path.contains(p.as_str()))
}

fn matches_ignore_pattern(finding: &Finding, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    match serde_json::to_string(finding) {
        Ok(serialized) => patterns.iter().any(|p| serialized.contains(p.as_str())),
        Err(e) => {
            tracing::warn!("Failed to serialize finding for ignore filter: {}", e);
            false
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{FindingLocation, FindingType};
    use std::time::Duration;

    fn finding(title: &str, severity: FindingSeverity, file: Option<&str>) -> Finding {
        let f = Finding::new(FindingType::Sast, severity, title, "desc", "sast");
        match file {
            Some(path) => f.with_location(FindingLocation::new(path).with_line(1)),
            None => f,
        }
    }

    #[test]
    fn test_build_invocation_binary() {
        let config = ScannerConfig::semgrep_defaults().with_timeout_secs(60);
        let spec = build_invocation(&config, &["scan".to_string(), "--json".to_string()]);
        assert_eq!(spec.program, "semgrep");
        assert_eq!(spec.args, vec!["scan", "--json"]);
        assert_eq!(spec.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_build_invocation_container() {
        let mut config = ScannerConfig::trivy_defaults();
        config.image = Some("aquasec/trivy:latest".to_string());
        config.volumes.push("/src:/scan".to_string());

        let spec = build_invocation(&config, &["fs".to_string(), "/scan".to_string()]);
        assert_eq!(spec.program, "docker");
        assert!(spec.args.contains(&"--rm".to_string()));
        assert!(spec.args.contains(&"aquasec/trivy:latest".to_string()));
        assert!(spec.args.contains(&"/src:/scan".to_string()));
    }

    #[test]
    fn test_build_invocation_appends_extra_args() {
        let mut config = ScannerConfig::trivy_defaults();
        config.extra_args.push("--quiet".to_string());
        let spec = build_invocation(&config, &["image".to_string()]);
        assert_eq!(spec.args, vec!["image", "--quiet"]);
    }

    #[test]
    fn test_unparseable_zero_exit_keeps_parse_error() {
        let output = ExecOutput {
            stdout: "not json".into(),
            stderr: String::new(),
            exit_code: 0,
            duration: Duration::from_millis(1),
        };
        let err = unparseable(
            "sast",
            &output,
            ScanError::Parse {
                scanner: "sast".into(),
                message: "bad json".into(),
            },
        );
        assert!(matches!(err, ScanError::Parse { .. }));
    }

    #[test]
    fn test_unparseable_nonzero_exit_is_hard_failure() {
        let output = ExecOutput {
            stdout: String::new(),
            stderr: "tool crashed".into(),
            exit_code: 2,
            duration: Duration::from_millis(1),
        };
        let err = unparseable(
            "sast",
            &output,
            ScanError::Parse {
                scanner: "sast".into(),
                message: "empty".into(),
            },
        );
        match err {
            ScanError::ScannerFailed { scanner, message } => {
                assert_eq!(scanner, "sast");
                assert!(message.contains("tool crashed"));
            }
            e => panic!("expected ScannerFailed, got {e:?}"),
        }
    }

    #[test]
    fn test_severity_allowlist_filter() {
        let config = ScannerConfig::default()
            .with_allowed_severities(vec![FindingSeverity::High, FindingSeverity::Critical]);
        let options = ScanOptions::default();

        let kept = apply_filters(
            vec![
                finding("a", FindingSeverity::Critical, None),
                finding("b", FindingSeverity::Low, None),
            ],
            &config,
            &options,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].severity, FindingSeverity::Critical);
    }

    #[test]
    fn test_severity_threshold_filter() {
        let config = ScannerConfig::default();
        let options = ScanOptions {
            severity_threshold: Some(FindingSeverity::Medium),
            ..Default::default()
        };

        let kept = apply_filters(
            vec![
                finding("a", FindingSeverity::Medium, None),
                finding("b", FindingSeverity::Low, None),
                finding("c", FindingSeverity::Info, None),
            ],
            &config,
            &options,
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_ignore_pattern_matches_serialized_finding() {
        let config = ScannerConfig::default().with_ignore_pattern("tests/fixtures");
        let options = ScanOptions::default();

        let kept = apply_filters(
            vec![
                finding("a", FindingSeverity::High, Some("tests/fixtures/leak.py")),
                finding("b", FindingSeverity::High, Some("src/main.py")),
            ],
            &config,
            &options,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(
            kept[0].location.as_ref().unwrap().file.to_string_lossy(),
            "src/main.py"
        );
    }

    #[test]
    fn test_path_include_exclude() {
        let config = ScannerConfig::default();
        let options = ScanOptions {
            include_paths: vec!["src/".to_string()],
            exclude_paths: vec!["src/generated".to_string()],
            ..Default::default()
        };

        let kept = apply_filters(
            vec![
                finding("a", FindingSeverity::High, Some("src/app.py")),
                finding("b", FindingSeverity::High, Some("src/generated/pb.py")),
                finding("c", FindingSeverity::High, Some("docs/guide.md")),
                finding("d", FindingSeverity::High, None),
            ],
            &config,
            &options,
        );
        // src/app.py passes; generated is excluded; docs is not included;
        // the locationless finding always passes path filters.
        assert_eq!(kept.len(), 2);
    }
}
