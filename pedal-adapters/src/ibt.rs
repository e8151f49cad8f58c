//! `.ibt` file replay
//!
//! Plays back an iRacing binary telemetry recording one record per poll, so a
//! recorded session drives the pipeline exactly like the live feed. Works on
//! all platforms.

use crate::irsdk::{DiskSubHeader, Header, VarLayout, DISK_SUB_HEADER_LEN, DISK_SUB_HEADER_OFFSET};
use anyhow::{ensure, Context, Result};
use pedal_core::session::SessionMetadata;
use pedal_core::source::{FieldError, FieldReader, FieldValue, SampleSource, SourceEvent};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::info;

/// Parsed `.ibt` file handle. Headers are read eagerly, samples on demand.
pub struct IbtFile {
    file: File,
    pub header: Header,
    pub disk_sub_header: DiskSubHeader,
    pub layout: VarLayout,
    session_info_yaml: String,
    sample_data_offset: u64,
}

impl IbtFile {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)
            .with_context(|| format!("Failed to open .ibt file: {}", path.display()))?;

        let mut fixed = vec![0u8; DISK_SUB_HEADER_OFFSET + DISK_SUB_HEADER_LEN];
        file.read_exact(&mut fixed)
            .context("File too short for an .ibt header")?;
        let header = Header::parse(&fixed)?;
        let disk_sub_header = DiskSubHeader::parse(&fixed)?;

        let data = header
            .var_bufs
            .first()
            .context(".ibt file declares no sample buffer")?;
        let sample_data_offset =
            u64::try_from(data.buf_offset).context("Negative sample data offset")?;
        let file_len = file.metadata().context("Failed to stat .ibt file")?.len();
        ensure!(
            sample_data_offset <= file_len,
            "Sample data offset {} is beyond end of file ({} bytes)",
            sample_data_offset,
            file_len
        );

        // Everything before the samples: headers, variable table, session info
        let mut preamble = vec![0u8; sample_data_offset as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut preamble)
            .context("Failed to read .ibt preamble")?;

        let layout = VarLayout::parse(&preamble, &header)?;
        let session_info_yaml = String::from_utf8_lossy(header.session_info(&preamble)?).into_owned();

        Ok(IbtFile {
            file,
            header,
            disk_sub_header,
            layout,
            session_info_yaml,
            sample_data_offset,
        })
    }

    pub fn record_count(&self) -> usize {
        self.disk_sub_header.session_record_count.max(0) as usize
    }

    pub fn tick_rate(&self) -> u32 {
        self.header.tick_rate.max(0) as u32
    }

    pub fn duration_secs(&self) -> f64 {
        self.disk_sub_header.session_end_time - self.disk_sub_header.session_start_time
    }

    pub fn session_info_yaml(&self) -> &str {
        &self.session_info_yaml
    }

    /// Read record `index` into `buf`, resizing it to one sample
    pub fn read_sample(&mut self, index: usize, buf: &mut Vec<u8>) -> Result<()> {
        ensure!(
            index < self.record_count(),
            "Sample index {} out of range (0..{})",
            index,
            self.record_count()
        );

        let buf_len = self.header.buf_len.max(0) as usize;
        let offset = self.sample_data_offset + (index as u64) * (buf_len as u64);

        buf.resize(buf_len, 0);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file
            .read_exact(buf)
            .with_context(|| format!("Failed to read sample {}", index))?;
        Ok(())
    }
}

/// Sample source replaying an `.ibt` recording
pub struct IbtReplaySource {
    path: PathBuf,
    file: Option<IbtFile>,
    metadata: Option<SessionMetadata>,
    sample: Vec<u8>,
    has_sample: bool,
    cursor: usize,
    announce: bool,
    finished: bool,
}

impl IbtReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            metadata: None,
            sample: Vec::new(),
            has_sample: false,
            cursor: 0,
            announce: false,
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records played so far
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// The whole recording has been played
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn close(&mut self) {
        self.file = None;
        self.has_sample = false;
    }
}

impl FieldReader for IbtReplaySource {
    fn get_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        match &self.file {
            Some(file) if self.has_sample => file.layout.read(name, &self.sample),
            _ => Err(FieldError::NotConnected),
        }
    }
}

impl SampleSource for IbtReplaySource {
    fn name(&self) -> &str {
        "iRacing replay"
    }

    fn detect(&self) -> bool {
        !self.finished && self.path.is_file()
    }

    fn connect(&mut self) -> Result<()> {
        let file = IbtFile::open(&self.path)?;
        info!(
            records = file.record_count(),
            tick_rate = file.tick_rate(),
            vars = file.layout.len(),
            "Opened replay {} ({:.1}s)",
            self.path.display(),
            file.duration_secs()
        );

        self.metadata = Some(SessionMetadata::from_yaml(file.session_info_yaml()));
        self.file = Some(file);
        self.cursor = 0;
        self.has_sample = false;
        self.announce = true;
        self.finished = false;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.close();
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<SourceEvent>> {
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };

        if self.announce {
            self.announce = false;
            return Ok(Some(SourceEvent::Connected));
        }

        if self.cursor >= file.record_count() {
            info!("Replay {} finished after {} records", self.path.display(), self.cursor);
            self.finished = true;
            self.close();
            return Ok(Some(SourceEvent::Disconnected));
        }

        file.read_sample(self.cursor, &mut self.sample)?;
        self.cursor += 1;
        self.has_sample = true;
        Ok(Some(SourceEvent::FrameReady))
    }

    fn session_metadata(&self) -> Option<SessionMetadata> {
        self.file.as_ref().and(self.metadata.clone())
    }

    fn is_connected(&self) -> bool {
        self.file.is_some()
    }
}
