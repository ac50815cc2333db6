//! JaCoCo backend
//!
//! Measurement processes run with the JaCoCo agent attached and write a
//! binary `.exec` file. Loading converts it to an XML report with
//! `jacococli report` and parses that. Records that already are XML
//! reports are parsed directly.

use super::{
    ClassCoverage, Counter, CounterKind, Counters, CoverageBackend, CoverageSnapshot,
    LineCoverage, MethodCoverage,
};
use crate::record::ExecutionRecord;
use crate::result::AnalysisError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// JaCoCo agent and report-conversion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JacocoConfig {
    /// Path to `jacocoagent.jar`
    pub agent_jar: PathBuf,
    /// Agent `includes` filter, forwarded verbatim (e.g. `io.quarkus.*`)
    pub includes: Option<String>,
    /// Path to `jacococli.jar`, needed to read `.exec` captures
    pub cli_jar: Option<PathBuf>,
    /// Class-file locations handed to `jacococli report --classfiles`
    pub class_files: Vec<PathBuf>,
    /// Java launcher used for the conversion
    pub java: String,
}

impl Default for JacocoConfig {
    fn default() -> Self {
        Self {
            agent_jar: PathBuf::from("jacocoagent.jar"),
            includes: None,
            cli_jar: None,
            class_files: Vec::new(),
            java: "java".to_string(),
        }
    }
}

impl JacocoConfig {
    /// Create a config for the given agent jar
    #[must_use]
    pub fn new(agent_jar: impl Into<PathBuf>) -> Self {
        Self {
            agent_jar: agent_jar.into(),
            ..Self::default()
        }
    }

    /// Set the agent inclusion filter
    #[must_use]
    pub fn with_includes(mut self, includes: impl Into<String>) -> Self {
        self.includes = Some(includes.into());
        self
    }

    /// Set the `jacococli.jar` used for `.exec` conversion
    #[must_use]
    pub fn with_cli_jar(mut self, cli_jar: impl Into<PathBuf>) -> Self {
        self.cli_jar = Some(cli_jar.into());
        self
    }

    /// Add a class-file directory or jar for report conversion
    #[must_use]
    pub fn with_class_files(mut self, path: impl Into<PathBuf>) -> Self {
        self.class_files.push(path.into());
        self
    }

    /// Set the Java launcher
    #[must_use]
    pub fn with_java(mut self, java: impl Into<String>) -> Self {
        self.java = java.into();
        self
    }
}

/// JaCoCo [`CoverageBackend`]
#[derive(Debug, Clone)]
pub struct JacocoBackend {
    config: JacocoConfig,
}

impl JacocoBackend {
    /// Create a backend from its config
    #[must_use]
    pub fn new(config: JacocoConfig) -> Self {
        Self { config }
    }

    /// The backend configuration
    #[must_use]
    pub fn config(&self) -> &JacocoConfig {
        &self.config
    }

    fn convert_to_xml(&self, exec: &Path) -> Result<PathBuf, AnalysisError> {
        let conversion = |message: String| AnalysisError::Conversion {
            path: exec.to_path_buf(),
            message,
        };
        let cli_jar = self.config.cli_jar.as_ref().ok_or_else(|| {
            conversion("no jacococli jar configured to read .exec captures".to_string())
        })?;
        if self.config.class_files.is_empty() {
            return Err(conversion("no class files configured".to_string()));
        }

        let xml_path = exec.with_extension("xml");
        let mut cmd = Command::new(&self.config.java);
        cmd.arg("-jar").arg(cli_jar).arg("report").arg(exec);
        for class_files in &self.config.class_files {
            cmd.arg("--classfiles").arg(class_files);
        }
        cmd.arg("--xml").arg(&xml_path).arg("--quiet");
        debug!(exec = %exec.display(), xml = %xml_path.display(), "converting capture");

        let output = cmd
            .output()
            .map_err(|e| conversion(format!("failed to run {}: {e}", self.config.java)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(conversion(format!(
                "jacococli exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(xml_path)
    }
}

impl CoverageBackend for JacocoBackend {
    fn name(&self) -> &str {
        "jacoco"
    }

    fn record_extension(&self) -> &str {
        "exec"
    }

    fn agent_argument(&self, destination: &Path, append: bool) -> String {
        let mut arg = format!(
            "-javaagent:{}=destfile={},append={}",
            self.config.agent_jar.display(),
            destination.display(),
            append
        );
        if let Some(includes) = &self.config.includes {
            arg.push_str(",includes=");
            arg.push_str(includes);
        }
        arg
    }

    fn load(&self, record: &ExecutionRecord) -> Result<CoverageSnapshot, AnalysisError> {
        let path = record.path();
        if let Err(source) = std::fs::metadata(path) {
            return Err(AnalysisError::Read {
                path: path.to_path_buf(),
                source,
            });
        }

        let is_xml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        let xml_path = if is_xml {
            path.to_path_buf()
        } else {
            self.convert_to_xml(path)?
        };

        let bytes = std::fs::read(&xml_path).map_err(|source| AnalysisError::Read {
            path: xml_path.clone(),
            source,
        })?;
        parse_jacoco_xml(&bytes, &xml_path)
    }
}

/// Parse a JaCoCo XML report.
///
/// Source-file lines are attributed to the top-level class named after the
/// file, falling back to the first class declaring that source file.
pub fn parse_jacoco_xml(bytes: &[u8], path: &Path) -> Result<CoverageSnapshot, AnalysisError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut state = ParseState::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => state.open(&tag, path)?,
            Ok(Event::Empty(tag)) => {
                state.open(&tag, path)?;
                state.close(tag.name().as_ref());
            }
            Ok(Event::End(tag)) => state.close(tag.name().as_ref()),
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(AnalysisError::corrupt(
                    path,
                    format!("failed to parse JaCoCo XML: {err}"),
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if !state.saw_report {
        return Err(AnalysisError::corrupt(path, "missing <report> root element"));
    }
    Ok(state.finish())
}

#[derive(Debug, Default)]
struct ParseState {
    saw_report: bool,
    package: Option<String>,
    class: Option<ClassCoverage>,
    method: Option<MethodCoverage>,
    source_file: Option<String>,
    classes: Vec<(String, ClassCoverage)>,
    source_lines: BTreeMap<(String, String), BTreeMap<u32, LineCoverage>>,
}

impl ParseState {
    fn open(&mut self, tag: &BytesStart<'_>, path: &Path) -> Result<(), AnalysisError> {
        match tag.name().as_ref() {
            b"report" => self.saw_report = true,
            b"package" => self.package = Some(attribute_value(tag, b"name").unwrap_or_default()),
            b"class" => {
                let name = required(tag, b"name", "class", path)?;
                let mut class = ClassCoverage::new(name);
                class.source_file = attribute_value(tag, b"sourcefilename");
                self.class = Some(class);
            }
            b"method" if self.class.is_some() => {
                self.method = Some(MethodCoverage {
                    name: required(tag, b"name", "method", path)?,
                    desc: attribute_value(tag, b"desc").unwrap_or_default(),
                    first_line: attribute_value(tag, b"line").and_then(|v| v.parse().ok()),
                    counters: Counters::default(),
                });
            }
            b"sourcefile" => self.source_file = attribute_value(tag, b"name"),
            b"counter" => self.counter(tag, path)?,
            b"line" => self.line(tag, path)?,
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"package" => self.package = None,
            b"class" => {
                if let Some(class) = self.class.take() {
                    let package = self.package.clone().unwrap_or_default();
                    self.classes.push((package, class));
                }
            }
            b"method" => {
                if let (Some(method), Some(class)) = (self.method.take(), self.class.as_mut()) {
                    class.methods.push(method);
                }
            }
            b"sourcefile" => self.source_file = None,
            _ => {}
        }
    }

    fn counter(&mut self, tag: &BytesStart<'_>, path: &Path) -> Result<(), AnalysisError> {
        let kind_name = required(tag, b"type", "counter", path)?;
        let Some(kind) = CounterKind::parse(&kind_name) else {
            // COMPLEXITY and CLASS counters are not tracked
            return Ok(());
        };
        let counter = Counter::new(
            number(tag, b"missed", path)?.unwrap_or(0),
            number(tag, b"covered", path)?.unwrap_or(0),
        );

        if let Some(method) = self.method.as_mut() {
            method.counters.set(kind, counter);
        } else if let Some(class) = self.class.as_mut() {
            class.counters.set(kind, counter);
        }
        Ok(())
    }

    fn line(&mut self, tag: &BytesStart<'_>, path: &Path) -> Result<(), AnalysisError> {
        let Some(file) = self.source_file.clone() else {
            return Ok(());
        };
        let nr = number(tag, b"nr", path)?
            .and_then(|nr| u32::try_from(nr).ok())
            .ok_or_else(|| AnalysisError::corrupt(path, "<line> without a valid nr"))?;
        let line = LineCoverage {
            missed_instructions: number(tag, b"mi", path)?.unwrap_or(0),
            covered_instructions: number(tag, b"ci", path)?.unwrap_or(0),
            missed_branches: number(tag, b"mb", path)?.unwrap_or(0),
            covered_branches: number(tag, b"cb", path)?.unwrap_or(0),
        };
        let package = self.package.clone().unwrap_or_default();
        let _ = self
            .source_lines
            .entry((package, file))
            .or_default()
            .insert(nr, line);
        Ok(())
    }

    fn finish(mut self) -> CoverageSnapshot {
        for ((package, file), lines) in std::mem::take(&mut self.source_lines) {
            if let Some(index) = self.owner_of(&package, &file) {
                self.classes[index].1.lines.extend(lines);
            }
        }

        let mut snapshot = CoverageSnapshot::new();
        for (_, class) in self.classes {
            snapshot.insert(class);
        }
        snapshot
    }

    fn owner_of(&self, package: &str, file: &str) -> Option<usize> {
        let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
        let expected = if package.is_empty() {
            stem.to_string()
        } else {
            format!("{package}/{stem}")
        };

        self.classes
            .iter()
            .position(|(_, class)| class.internal_name == expected)
            .or_else(|| {
                self.classes.iter().position(|(pkg, class)| {
                    pkg == package && class.source_file.as_deref() == Some(file)
                })
            })
    }
}

fn attribute_value(tag: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    tag.attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn required(
    tag: &BytesStart<'_>,
    name: &[u8],
    element: &str,
    path: &Path,
) -> Result<String, AnalysisError> {
    attribute_value(tag, name).ok_or_else(|| {
        AnalysisError::corrupt(
            path,
            format!(
                "<{element}> without {} attribute",
                String::from_utf8_lossy(name)
            ),
        )
    })
}

fn number(tag: &BytesStart<'_>, name: &[u8], path: &Path) -> Result<Option<u64>, AnalysisError> {
    attribute_value(tag, name)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                AnalysisError::corrupt(
                    path,
                    format!(
                        "attribute {}=\"{raw}\" is not a number",
                        String::from_utf8_lossy(name)
                    ),
                )
            })
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::LineStatus;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd">
<report name="cand_0">
  <sessioninfo id="host-1" start="1" dump="2"/>
  <package name="com/acme">
    <class name="com/acme/Parser" sourcefilename="Parser.java">
      <method name="&lt;init&gt;" desc="()V" line="3">
        <counter type="INSTRUCTION" missed="0" covered="3"/>
        <counter type="LINE" missed="0" covered="1"/>
        <counter type="COMPLEXITY" missed="0" covered="1"/>
        <counter type="METHOD" missed="0" covered="1"/>
      </method>
      <method name="parse" desc="(Ljava/lang/String;)I" line="5">
        <counter type="INSTRUCTION" missed="2" covered="6"/>
        <counter type="BRANCH" missed="1" covered="1"/>
        <counter type="LINE" missed="1" covered="2"/>
        <counter type="METHOD" missed="0" covered="1"/>
      </method>
      <counter type="INSTRUCTION" missed="2" covered="9"/>
      <counter type="BRANCH" missed="1" covered="1"/>
      <counter type="LINE" missed="1" covered="3"/>
      <counter type="METHOD" missed="0" covered="2"/>
      <counter type="CLASS" missed="0" covered="1"/>
    </class>
    <class name="com/acme/Parser$Token" sourcefilename="Parser.java">
      <method name="kind" desc="()I" line="12"/>
      <counter type="METHOD" missed="1" covered="0"/>
    </class>
    <sourcefile name="Parser.java">
      <line nr="3" mi="0" ci="3" mb="0" cb="0"/>
      <line nr="5" mi="0" ci="4" mb="1" cb="1"/>
      <line nr="6" mi="0" ci="2" mb="0" cb="0"/>
      <line nr="7" mi="2" ci="0" mb="0" cb="0"/>
      <counter type="LINE" missed="1" covered="3"/>
    </sourcefile>
    <counter type="LINE" missed="1" covered="3"/>
  </package>
  <counter type="LINE" missed="1" covered="3"/>
</report>"#;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_classes_and_counters() {
            let snapshot = parse_jacoco_xml(REPORT.as_bytes(), Path::new("r.xml")).unwrap();
            assert_eq!(snapshot.len(), 2);

            let parser = snapshot.class("com.acme.Parser").unwrap();
            assert_eq!(parser.internal_name, "com/acme/Parser");
            assert_eq!(parser.source_file.as_deref(), Some("Parser.java"));
            assert_eq!(parser.counters.line, Counter::new(1, 3));
            assert_eq!(parser.counters.instruction, Counter::new(2, 9));
            assert_eq!(parser.counters.branch, Counter::new(1, 1));
            assert_eq!(parser.counters.method, Counter::new(0, 2));
        }

        #[test]
        fn test_methods_unescaped() {
            let snapshot = parse_jacoco_xml(REPORT.as_bytes(), Path::new("r.xml")).unwrap();
            let parser = snapshot.class("com.acme.Parser").unwrap();
            let names: Vec<&str> = parser.methods.iter().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["<init>", "parse"]);
            assert_eq!(parser.methods[1].first_line, Some(5));
            assert_eq!(parser.methods[1].counters.branch, Counter::new(1, 1));
        }

        #[test]
        fn test_empty_method_element_closes() {
            let snapshot = parse_jacoco_xml(REPORT.as_bytes(), Path::new("r.xml")).unwrap();
            let token = snapshot.class("com.acme.Parser$Token").unwrap();
            assert_eq!(token.methods.len(), 1);
            assert_eq!(token.counters.method, Counter::new(1, 0));
        }

        #[test]
        fn test_lines_attributed_to_top_level_class() {
            let snapshot = parse_jacoco_xml(REPORT.as_bytes(), Path::new("r.xml")).unwrap();
            let parser = snapshot.class("com.acme.Parser").unwrap();
            assert_eq!(parser.lines.len(), 4);
            assert_eq!(parser.lines[&5].status(), LineStatus::PartlyCovered);
            assert_eq!(parser.lines[&6].status(), LineStatus::FullyCovered);
            assert_eq!(parser.lines[&7].status(), LineStatus::NotCovered);
            assert!(snapshot.class("com.acme.Parser$Token").unwrap().lines.is_empty());
        }

        #[test]
        fn test_fallback_owner_by_source_file() {
            let xml = r#"<report name="r"><package name="p">
                <class name="p/Helper" sourcefilename="Utils.java"/>
                <sourcefile name="Utils.java"><line nr="9" mi="0" ci="1" mb="0" cb="0"/></sourcefile>
            </package></report>"#;
            let snapshot = parse_jacoco_xml(xml.as_bytes(), Path::new("r.xml")).unwrap();
            assert!(snapshot.class("p.Helper").unwrap().lines.contains_key(&9));
        }

        #[test]
        fn test_default_package() {
            let xml = r#"<report name="r"><package name="">
                <class name="Main" sourcefilename="Main.java"/>
                <sourcefile name="Main.java"><line nr="1" mi="0" ci="1" mb="0" cb="0"/></sourcefile>
            </package></report>"#;
            let snapshot = parse_jacoco_xml(xml.as_bytes(), Path::new("r.xml")).unwrap();
            assert_eq!(snapshot.class("Main").unwrap().lines.len(), 1);
        }

        #[test]
        fn test_empty_input_is_corrupt() {
            let err = parse_jacoco_xml(b"", Path::new("r.xml")).unwrap_err();
            assert!(matches!(err, AnalysisError::Corrupt { .. }));
        }

        #[test]
        fn test_bad_number_is_corrupt() {
            let xml = r#"<report name="r"><package name="p"><class name="p/A">
                <counter type="LINE" missed="x" covered="1"/></class></package></report>"#;
            let err = parse_jacoco_xml(xml.as_bytes(), Path::new("r.xml")).unwrap_err();
            assert!(err.to_string().contains("missed"));
        }

        #[test]
        fn test_mismatched_tags_are_corrupt() {
            let xml = r#"<report name="r"><package name="p"></class></report>"#;
            let err = parse_jacoco_xml(xml.as_bytes(), Path::new("r.xml")).unwrap_err();
            assert!(matches!(err, AnalysisError::Corrupt { .. }));
        }
    }

    mod backend_tests {
        use super::*;

        #[test]
        fn test_agent_argument() {
            let backend = JacocoBackend::new(
                JacocoConfig::new("/opt/jacoco/jacocoagent.jar").with_includes("io.quarkus.*"),
            );
            let arg = backend.agent_argument(Path::new("/work/cand_0.exec"), false);
            assert_eq!(
                arg,
                "-javaagent:/opt/jacoco/jacocoagent.jar=destfile=/work/cand_0.exec,append=false,includes=io.quarkus.*"
            );
        }

        #[test]
        fn test_agent_argument_without_includes() {
            let backend = JacocoBackend::new(JacocoConfig::new("agent.jar"));
            let arg = backend.agent_argument(Path::new("out.exec"), true);
            assert_eq!(arg, "-javaagent:agent.jar=destfile=out.exec,append=true");
        }

        #[test]
        fn test_load_xml_record_directly() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("baseline.xml");
            std::fs::write(&path, REPORT).unwrap();

            let backend = JacocoBackend::new(JacocoConfig::default());
            let snapshot = backend
                .load(&ExecutionRecord::new(&path, Vec::new()))
                .unwrap();
            assert_eq!(snapshot.len(), 2);
        }

        #[test]
        fn test_load_missing_record() {
            let backend = JacocoBackend::new(JacocoConfig::default());
            let err = backend
                .load(&ExecutionRecord::new("/no/such/cand_3.exec", Vec::new()))
                .unwrap_err();
            assert!(matches!(err, AnalysisError::Read { .. }));
        }

        #[test]
        fn test_exec_without_cli_jar_fails_conversion() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("cand_0.exec");
            std::fs::write(&path, b"\x01\xc0\xc0").unwrap();

            let backend = JacocoBackend::new(JacocoConfig::default());
            let err = backend
                .load(&ExecutionRecord::new(&path, Vec::new()))
                .unwrap_err();
            assert!(matches!(err, AnalysisError::Conversion { .. }));
        }

        #[test]
        fn test_config_serde_defaults() {
            let config: JacocoConfig =
                serde_json::from_str(r#"{"agent_jar":"a.jar","includes":"com.acme.*"}"#).unwrap();
            assert_eq!(config.agent_jar, PathBuf::from("a.jar"));
            assert_eq!(config.includes.as_deref(), Some("com.acme.*"));
            assert_eq!(config.java, "java");
        }
    }
}
