//! The firmware build report of an ASI card (`BU X`).
//!
//! ```text
//! TIGER_COMM
//! Motor Axes: Z F P Q R S X Y V W
//! Axis Types: p p u u u u x x z z
//! Axis Addr: 1 2 3 3 3 3 4 4 5 5
//! Hex Addr: 31 32 33 33 33 33 34 34 35 35
//! Axis Props:   1   0   0   0   0   0   0   1   0   0
//! SINGLEAXIS_FUNCTION
//! ```
//!
//! Older firmware leaves out the `Hex Addr:` and `Axis Props:` rows, so those
//! are recognized by their label. Everything after the axis rows is a define,
//! a feature flag compiled into the firmware.

use snafu::ensure;

use crate::error::{NotEnoughAxesSnafu, Result, TooLargeAddressesSnafu};
use crate::parse::LeadingNumber;
use crate::reply::{tokenize, SplitPolicy};
use crate::terminator::LINE_SEPARATOR;

/// Name, the three mandatory axis rows and at least one more line.
const MIN_REPORT_LINES: usize = 5;

const HEX_ADDR_LABEL: &str = "Hex Addr:";
const AXIS_PROPS_LABEL: &str = "Axis Props:";

/// The installed axes and features of a card.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FirmwareBuild {
    pub build_name: String,
    pub num_axes: usize,
    /// Upper case axis letters.
    pub axis_letters: Vec<char>,
    /// One type code per axis, e.g. `x` for an XY stage axis.
    pub axis_types: Vec<char>,
    /// Card addresses. Legacy cards report non-printable high-byte addresses,
    /// so these stay text.
    pub axis_addrs: Vec<String>,
    pub axis_addrs_hex: Vec<String>,
    /// Property bit flags per axis.
    pub axis_props: Vec<i32>,
    pub defines: Vec<String>,
}

/// The values of a labelled row such as `Axis Types: x x z`.
///
/// Rows may be padded with runs of spaces, so empty tokens are dropped.
fn row_values(line: &str) -> Vec<String> {
    tokenize(line, " ", SplitPolicy::SkipEmpty)
        .into_iter()
        .skip(2)
        .collect()
}

fn first_chars(values: &[String]) -> Vec<char> {
    values.iter().filter_map(|v| v.chars().next()).collect()
}

impl FirmwareBuild {
    /// Parse a build report.
    ///
    /// # Errors
    /// [`NotEnoughAxes`](crate::Error::NotEnoughAxes) if the report is too
    /// short, lists no axes, or a row doesn't have one entry per axis.
    /// [`TooLargeAddresses`](crate::Error::TooLargeAddresses) if the report
    /// has no hex addresses and a card address isn't a digit from 1 to 9.
    pub fn parse(report: &str) -> Result<Self> {
        let mut lines: Vec<&str> = report
            .split(LINE_SEPARATOR)
            .map(|l| l.trim_matches('\n'))
            .collect();
        while lines.last().map_or(false, |l| l.is_empty()) {
            lines.pop();
        }
        ensure!(lines.len() >= MIN_REPORT_LINES, NotEnoughAxesSnafu);

        let axis_letters: Vec<char> = first_chars(&row_values(lines[1]))
            .into_iter()
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let num_axes = axis_letters.len();
        ensure!(num_axes > 0, NotEnoughAxesSnafu);

        let axis_types = first_chars(&row_values(lines[2]));
        ensure!(axis_types.len() == num_axes, NotEnoughAxesSnafu);

        let axis_addrs = row_values(lines[3]);
        ensure!(axis_addrs.len() >= num_axes, NotEnoughAxesSnafu);

        let mut rest = &lines[4..];

        let axis_addrs_hex = match rest.first() {
            Some(line) if line.starts_with(HEX_ADDR_LABEL) => {
                rest = &rest[1..];
                row_values(line)
            }
            _ => axis_addrs
                .iter()
                .take(num_axes)
                .map(|addr| synthesize_hex(addr))
                .collect::<Result<_>>()?,
        };

        let axis_props = match rest.first() {
            Some(line) if line.starts_with(AXIS_PROPS_LABEL) => {
                rest = &rest[1..];
                let props: Vec<i32> = row_values(line)
                    .iter()
                    .map(|p| i32::from_leading(p))
                    .collect();
                ensure!(props.len() == num_axes, NotEnoughAxesSnafu);
                props
            }
            _ => vec![0; num_axes],
        };

        Ok(FirmwareBuild {
            build_name: lines[0].into(),
            num_axes,
            axis_letters,
            axis_types,
            axis_addrs,
            axis_addrs_hex,
            axis_props,
            defines: rest.iter().map(|d| String::from(*d)).collect(),
        })
    }

    /// True if `define` is one of the defines, compared whole.
    pub fn is_define_present(&self, define: &str) -> bool {
        self.defines.iter().any(|d| d == define)
    }

    /// The first define containing `substring`.
    pub fn define_string(&self, substring: &str) -> Option<&str> {
        self.defines
            .iter()
            .find(|d| d.contains(substring))
            .map(String::as_str)
    }
}

/// The hex address old firmware doesn't report: `'3'` followed by the
/// address digit, i.e. the ASCII code of the digit.
fn synthesize_hex(addr: &str) -> Result<String> {
    let c = addr.chars().next().unwrap_or('\0');
    ensure!(('1'..='9').contains(&c), TooLargeAddressesSnafu);
    Ok(format!("3{}", addr))
}
