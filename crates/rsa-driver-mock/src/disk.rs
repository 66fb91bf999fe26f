//! Capture file output.
//!
//! Split SIQ writes `<base><suffix>.siqh` (text header) and
//! `<base><suffix>.siqd` (raw little-endian samples). Combined SIQ writes
//! the header followed by the data into `.siq`; TIQ writes `.tiq`.

use std::fs;
use std::io;

use chrono::{DateTime, Local};
use rsa_core::{DataType, Destination, FilenameSuffix};

/// Values written into the SIQ header.
#[derive(Debug, Clone)]
pub struct SiqHeader {
    /// Sample pairs in the data file
    pub number_samples: u64,
    /// Output sample rate
    pub sample_rate: f64,
    /// Acquisition bandwidth
    pub bandwidth_hz: f64,
    /// Center frequency
    pub center_frequency_hz: f64,
    /// Reference level
    pub reference_level_dbm: f64,
    /// Sample datatype
    pub datatype: DataType,
    /// Acquisition status word
    pub acq_status: u32,
    /// Capture start
    pub started: DateTime<Local>,
}

impl SiqHeader {
    fn render(&self, data_offset: Option<usize>) -> String {
        let format = match self.datatype {
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Single | DataType::SingleScaleInt32 => "float32",
        };
        let mut lines = vec![
            "RSASIQHT:1".to_string(),
            format!("FileDateTime:{}", self.started.format("%Y-%m-%dT%H:%M:%S%.3f")),
            format!("NumberSamples:{}", self.number_samples),
            format!("SampleRate:{}", self.sample_rate),
            format!("AcqBandwidth:{}", self.bandwidth_hz),
            format!("CenterFrequency:{}", self.center_frequency_hz),
            format!("ReferenceLevel:{}", self.reference_level_dbm),
            format!("DataType:{format}"),
            "DataByteOrder:LittleEndian".to_string(),
            format!("AcqStatus:0x{:08X}", self.acq_status),
        ];
        if let Some(offset) = data_offset {
            lines.push(format!("DataOffset:{offset}"));
        }
        lines.join("\n") + "\n"
    }
}

/// Text appended to the filename base for this file.
///
/// Index suffixes advance by one after each file.
pub fn next_suffix(suffix: &mut FilenameSuffix, now: DateTime<Local>) -> String {
    match suffix {
        FilenameSuffix::None => String::new(),
        FilenameSuffix::Timestamp => now.format("-%Y.%m.%d.%H.%M.%S.%3f").to_string(),
        FilenameSuffix::Index(index) => {
            let text = format!("-{:05}", index);
            *index = index.saturating_add(1);
            text
        }
    }
}

/// Encode interleaved values in the requested datatype.
pub fn encode(values: &[f32], datatype: DataType, full_scale: f32) -> Vec<u8> {
    match datatype {
        DataType::Single | DataType::SingleScaleInt32 => {
            values.iter().flat_map(|v| v.to_le_bytes()).collect()
        }
        DataType::Int32 => values
            .iter()
            .flat_map(|v| ((v * full_scale).round() as i32).to_le_bytes())
            .collect(),
        DataType::Int16 => values
            .iter()
            .flat_map(|v| ((v * full_scale).round() as i16).to_le_bytes())
            .collect(),
    }
}

/// Write one capture; returns the paths of the files written.
pub fn write_capture(
    destination: Destination,
    path_stem: &str,
    header: &SiqHeader,
    data: &[u8],
) -> io::Result<Vec<String>> {
    match destination {
        Destination::FileSiqSplit => {
            let header_path = format!("{path_stem}.siqh");
            let data_path = format!("{path_stem}.siqd");
            fs::write(&header_path, header.render(None))?;
            fs::write(&data_path, data)?;
            Ok(vec![header_path, data_path])
        }
        Destination::FileSiq => {
            let path = format!("{path_stem}.siq");
            // The offset line counts its own digits.
            let mut offset = 0;
            loop {
                let len = header.render(Some(offset)).len();
                if len == offset {
                    break;
                }
                offset = len;
            }
            let mut contents = header.render(Some(offset)).into_bytes();
            contents.extend_from_slice(data);
            fs::write(&path, contents)?;
            Ok(vec![path])
        }
        Destination::FileTiq => {
            let path = format!("{path_stem}.tiq");
            fs::write(&path, data)?;
            Ok(vec![path])
        }
        Destination::Client => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> SiqHeader {
        SiqHeader {
            number_samples: 2,
            sample_rate: 14.0e6,
            bandwidth_hz: 10.0e6,
            center_frequency_hz: 1.0e9,
            reference_level_dbm: 0.0,
            datatype: DataType::Single,
            acq_status: 0,
            started: Local::now(),
        }
    }

    #[test]
    fn test_suffixes() {
        let now = Local::now();
        let mut none = FilenameSuffix::None;
        assert_eq!(next_suffix(&mut none, now), "");

        let mut index = FilenameSuffix::Index(7);
        assert_eq!(next_suffix(&mut index, now), "-00007");
        assert_eq!(next_suffix(&mut index, now), "-00008");

        let mut stamp = FilenameSuffix::Timestamp;
        assert!(next_suffix(&mut stamp, now).starts_with('-'));
    }

    #[test]
    fn test_encode_widths() {
        assert_eq!(encode(&[1.0, 2.0], DataType::Single, 1.0).len(), 8);
        assert_eq!(encode(&[0.5, -0.5], DataType::Int16, 100.0), vec![50, 0, 206, 255]);
    }

    #[test]
    fn test_split_siq_files() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("capture").to_string_lossy().into_owned();
        let data = encode(&[1.0, 2.0, 3.0, 4.0], DataType::Single, 1.0);

        let files = write_capture(Destination::FileSiqSplit, &stem, &header(), &data).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with(".siqh"));
        assert!(files[1].ends_with(".siqd"));
        assert_eq!(fs::read(&files[1]).unwrap(), data);
        let text = fs::read_to_string(&files[0]).unwrap();
        assert!(text.starts_with("RSASIQHT:1"));
        assert!(text.contains("NumberSamples:2"));
    }

    #[test]
    fn test_combined_siq_offset() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("capture").to_string_lossy().into_owned();
        let data = encode(&[1.0, 2.0], DataType::Single, 1.0);

        let files = write_capture(Destination::FileSiq, &stem, &header(), &data).unwrap();
        let contents = fs::read(&files[0]).unwrap();
        let text = String::from_utf8_lossy(&contents);
        let offset: usize = text
            .lines()
            .find_map(|l| l.strip_prefix("DataOffset:"))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(&contents[offset..], data.as_slice());
    }
}
