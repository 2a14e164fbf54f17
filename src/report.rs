use crate::config::ProbeConfig;
use crate::error::ProbeResult;
use crate::header::{Header, HeaderAnomaly};
use crate::memory::{MemoryRegion, MemorySummary};
use crate::properties::{PropertyAnalysis, PropertyTable, PropertyTableAnalyzer, Violation};
use crate::tracer::{Trace, TraceStep, Tracer};
use indexmap::IndexMap;
use log::{debug, info};
use std::fmt::{Display, Error, Formatter};

/// Exit statuses at or above this value are reserved for fatal errors
pub const MAX_VIOLATION_STATUS: usize = 100;

/// Process exit status for a finished probe: 0 when clean, otherwise the
/// violation count clamped to 1..=100
pub fn exit_status(violations: usize) -> i32 {
    violations.min(MAX_VIOLATION_STATUS) as i32
}

/// Everything the probe found in one story file
#[derive(Debug, Clone)]
pub struct Report {
    pub header: Header,
    pub header_anomalies: Vec<HeaderAnomaly>,
    pub memory: MemorySummary,
    pub trace: Trace,
    pub properties: PropertyAnalysis,
    pub list_properties: bool,
    pub raw_byte_limit: usize,
}

impl Report {
    pub fn build(bytes: &[u8], config: &ProbeConfig) -> ProbeResult<Report> {
        let header = Header::parse(bytes)?;
        let header_anomalies = header.anomalies();
        for anomaly in &header_anomalies {
            info!("Header: {}", anomaly);
        }

        let memory = MemorySummary::scan(bytes, &header);

        let start_pc = config.start_pc.unwrap_or(header.initial_pc as usize);
        let trace = Tracer::new(bytes, &header).trace(start_pc, config.max_steps);

        let properties = PropertyTableAnalyzer::new(bytes, &header).analyze();
        debug!(
            "{} objects walked, {} violations, {} anomalies",
            properties.objects.len(),
            properties.violations.len(),
            properties.anomalies.len()
        );

        Ok(Report {
            header,
            header_anomalies,
            memory,
            trace,
            properties,
            list_properties: config.list_properties,
            raw_byte_limit: config.raw_byte_limit,
        })
    }

    pub fn violations(&self) -> &[Violation] {
        &self.properties.violations
    }

    pub fn exit_status(&self) -> i32 {
        exit_status(self.violations().len())
    }

    fn fmt_header(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "=== HEADER ===")?;
        write!(f, "{}", self.header)?;
        for anomaly in &self.header_anomalies {
            writeln!(f, "WARNING: {}", anomaly)?;
        }
        Ok(())
    }

    fn fmt_memory(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "\n=== MEMORY REGIONS ===")?;
        write!(f, "{}", self.memory)
    }

    fn fmt_step(&self, f: &mut Formatter<'_>, step: &TraceStep) -> Result<(), Error> {
        writeln!(
            f,
            "{:3}: {:#06x}  {}",
            step.index, step.address, step.instruction
        )?;
        writeln!(
            f,
            "     bytes: {}",
            format_raw(&step.raw, self.raw_byte_limit)
        )?;
        if step.high_memory_warning {
            writeln!(
                f,
                "     WARNING: PC in high memory area (>= {:#06x})",
                self.header.high_memory_base
            )?;
        } else if step.region == MemoryRegion::Static {
            writeln!(f, "     INFO: PC in static memory area")?;
        }
        if !step.instruction.is_known() {
            writeln!(f, "     WARNING: unknown opcode")?;
        }
        if let Some(target) = step.instruction.jump_target() {
            writeln!(f, "     jump -> {:#06x}", target)?;
        }
        if step.instruction.truncated {
            writeln!(f, "     (truncated at end of file)")?;
        }
        Ok(())
    }

    fn fmt_trace(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(
            f,
            "\n=== TRACE FROM {:#06x} ===",
            self.trace.start_pc
        )?;
        for step in &self.trace.steps {
            self.fmt_step(f, step)?;
        }
        writeln!(f, "{}", self.trace.termination)
    }

    fn fmt_table(f: &mut Formatter<'_>, number: u16, table: &PropertyTable) -> Result<(), Error> {
        writeln!(
            f,
            "Object #{} \"{}\" - Property table at {:#06x}",
            number, table.name, table.address
        )?;
        for property in &table.properties {
            write!(
                f,
                "  Property #{}: {} bytes at {:#06x}:",
                property.number, property.size, property.address
            )?;
            for byte in &property.data {
                write!(f, " {:02x}", byte)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }

    fn fmt_properties(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "\n=== OBJECT PROPERTIES ===")?;
        for object in &self.properties.objects {
            Self::fmt_table(f, object.number, &object.table)?;
        }
        Ok(())
    }

    fn fmt_violations(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "\n=== VIOLATIONS SUMMARY ===")?;
        let limit = self.properties.limit;

        for anomaly in &self.properties.anomalies {
            writeln!(f, "WARNING: {}", anomaly)?;
        }

        let violations = self.violations();
        if violations.is_empty() {
            writeln!(
                f,
                "No property size violations found (max allowed: {} bytes)",
                limit
            )?;
            return Ok(());
        }

        writeln!(f, "Found {} property size violations:", violations.len())?;
        let mut by_object: IndexMap<u16, Vec<&Violation>> = IndexMap::new();
        for v in violations {
            by_object.entry(v.object).or_default().push(v);
        }
        for (object, found) in &by_object {
            writeln!(f, "  Object #{} ({} violations):", object, found.len())?;
            for v in found {
                writeln!(
                    f,
                    "    Property #{}: {} bytes (max allowed: {})",
                    v.property, v.size, limit
                )?;
                writeln!(
                    f,
                    "      Size byte: {:#04x} at address {:#06x}",
                    v.size_byte, v.address
                )?;
            }
        }
        Ok(())
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        self.fmt_header(f)?;
        self.fmt_memory(f)?;
        self.fmt_trace(f)?;
        if self.list_properties {
            self.fmt_properties(f)?;
        }
        self.fmt_violations(f)
    }
}

/// A single property table, as printed by the `property` command
pub struct TableListing<'a> {
    pub table: &'a PropertyTable,
}

impl Display for TableListing<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        Report::fmt_table(f, 0, self.table)?;
        for property in &self.table.properties {
            if let Some(value) = property.value() {
                writeln!(f, "  #{} = {:#06x} ({})", property.number, value, value)?;
            }
        }
        for anomaly in &self.table.anomalies {
            writeln!(f, "WARNING: {}", anomaly)?;
        }
        Ok(())
    }
}

/// Hex bytes, cut to `limit` with a trailing marker
fn format_raw(raw: &[u8], limit: usize) -> String {
    let mut out = raw
        .iter()
        .take(limit)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if raw.len() > limit {
        out.push_str(" ..");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{basic_property, extended_property, property_table, StoryBuilder};

    #[test]
    fn test_exit_status_clamped() {
        assert_eq!(exit_status(0), 0);
        assert_eq!(exit_status(1), 1);
        assert_eq!(exit_status(37), 37);
        assert_eq!(exit_status(100), 100);
        assert_eq!(exit_status(5000), 100);
    }

    #[test]
    fn test_format_raw() {
        assert_eq!(format_raw(&[0x14, 0x05, 0x03, 0x10], 8), "14 05 03 10");
        assert_eq!(format_raw(&[1, 2, 3], 2), "01 02 ..");
        assert_eq!(format_raw(&[], 8), "");
    }

    #[test]
    fn test_report_sections() {
        let story = StoryBuilder::new()
            .object(property_table(
                &[],
                &[
                    extended_property(12, 9, &[0; 9]),
                    basic_property(4, &[1, 2]),
                ],
            ))
            .code(&[0x8C, 0x00, 0x05, 0xB4, 0xB4, 0xB1])
            .build();

        let report = Report::build(&story, &ProbeConfig::default()).unwrap();
        assert_eq!(report.violations().len(), 1);
        assert_eq!(report.exit_status(), 1);

        let text = report.to_string();
        assert!(text.contains("=== HEADER ==="));
        assert!(text.contains("=== MEMORY REGIONS ==="));
        assert!(text.contains("jump #0005"));
        assert!(text.contains("jump -> "));
        assert!(text.contains("Execution would return FALSE"));
        assert!(text.contains("Found 1 property size violations:"));
        assert!(text.contains("Object #1 (1 violations):"));
        assert!(text.contains("Property #12: 9 bytes (max allowed: 8)"));
        assert!(text.contains("Size byte: 0x8c"));
        assert!(!text.contains("=== OBJECT PROPERTIES ==="));
    }

    #[test]
    fn test_violations_grouped_under_one_heading_per_object() {
        let story = StoryBuilder::new()
            .object(property_table(
                &[],
                &[
                    extended_property(12, 9, &[0; 9]),
                    extended_property(10, 10, &[0; 10]),
                ],
            ))
            .object(property_table(&[], &[extended_property(3, 9, &[0; 9])]))
            .code(&[0xB0])
            .build();

        let report = Report::build(&story, &ProbeConfig::default()).unwrap();
        assert_eq!(report.exit_status(), 3);

        let text = report.to_string();
        assert_eq!(text.matches("Object #1 (").count(), 1);
        assert!(text.contains("Object #1 (2 violations):"));
        assert!(text.contains("Object #2 (1 violations):"));

        let first = text.find("Object #1 (").unwrap();
        let second = text.find("Object #2 (").unwrap();
        let prop_10 = text.find("Property #10: 10 bytes").unwrap();
        assert!(first < prop_10 && prop_10 < second);
    }

    #[test]
    fn test_unknown_opcode_flagged_in_trace() {
        let story = StoryBuilder::new()
            .code(&[0x1D, 0x01, 0x02, 0xB0])
            .build();

        let text = Report::build(&story, &ProbeConfig::default())
            .unwrap()
            .to_string();
        assert!(text.contains("unknown_2op_1d #01, #02"));
        assert!(text.contains("WARNING: unknown opcode"));
        assert_eq!(text.matches("WARNING: unknown opcode").count(), 1);
    }

    #[test]
    fn test_report_lists_properties_on_request() {
        let story = StoryBuilder::new()
            .object(property_table(&[], &[basic_property(4, &[1, 2])]))
            .code(&[0xB0])
            .build();
        let config = ProbeConfig {
            list_properties: true,
            ..Default::default()
        };

        let report = Report::build(&story, &config).unwrap();
        assert_eq!(report.exit_status(), 0);
        let text = report.to_string();
        assert!(text.contains("=== OBJECT PROPERTIES ==="));
        assert!(text.contains("Property #4: 2 bytes at"));
        assert!(text.contains("No property size violations found"));
    }

    #[test]
    fn test_report_honours_start_pc() {
        let story = StoryBuilder::new().code(&[0xB4, 0xB0]).build();
        let header = Header::parse(&story).unwrap();
        let config = ProbeConfig {
            start_pc: Some(header.initial_pc as usize + 1),
            ..Default::default()
        };

        let report = Report::build(&story, &config).unwrap();
        assert_eq!(report.trace.steps.len(), 1);
        assert_eq!(report.trace.steps[0].instruction.name, "rtrue");
    }

    #[test]
    fn test_short_file_is_error() {
        assert!(Report::build(&[3, 0, 0], &ProbeConfig::default()).is_err());
    }
}
