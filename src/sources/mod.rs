pub mod attitude_csv;
pub mod gpx_track;

pub use attitude_csv::{load_attitude_csv, read_attitude_csv};
pub use gpx_track::{load_gpx_track, read_gpx_track};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::Result;

/// Open a telemetry file, transparently gunzipping `*.gz`
pub fn open_source(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};

    #[test]
    fn test_open_plain_and_gzip() {
        let dir = std::env::temp_dir().join(format!("geotag_sources_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let plain = dir.join("attitude.csv");
        std::fs::write(&plain, "t,roll,pitch\n1,2,3\n").unwrap();

        let gz = dir.join("attitude.csv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"t,roll,pitch\n1,2,3\n").unwrap();
        std::fs::write(&gz, encoder.finish().unwrap()).unwrap();

        for path in [&plain, &gz] {
            let mut text = String::new();
            open_source(path).unwrap().read_to_string(&mut text).unwrap();
            assert_eq!(text, "t,roll,pitch\n1,2,3\n");
        }

        assert!(open_source(&dir.join("missing.csv")).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
