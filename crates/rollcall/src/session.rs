//! Recognition session: matches faces frame by frame and marks each enrolled
//! person present the first time they are seen in this run.

use crate::attendance::{AttendanceError, AttendanceLog, AttendanceRecord, MISSING_IDENTIFIER};
use crate::display::{Control, DisplayError, Viewer};
use crate::index::EncodingIndex;
use crate::roster::Roster;
use chrono::NaiveDateTime;
use rollcall_core::{BoundingBox, EngineError, FaceEngine, MatchPredicate};
use rollcall_hw::{Frame, FrameSource};
use std::collections::HashSet;
use thiserror::Error;

/// Label rendered for a face that matches no enrolled image.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("frame capture failed: {0}")]
    Capture(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
    #[error(transparent)]
    Display(#[from] DisplayError),
}

/// One face seen in one frame.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub face: BoundingBox,
    /// Enrolled display name, or `None` for an unknown face.
    pub name: Option<String>,
    /// True if this sighting wrote the person's attendance row.
    pub newly_marked: bool,
}

impl Sighting {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub faces: u64,
    /// Names marked during the run, in the order they were marked.
    pub marked: Vec<String>,
}

/// Everything the recognition loop reads or mutates. The marked set lives only
/// as long as the session, so a new session logs everyone again.
pub struct Session {
    roster: Roster,
    index: EncodingIndex,
    predicate: Box<dyn MatchPredicate>,
    log: AttendanceLog,
    marked: HashSet<String>,
    marked_order: Vec<String>,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

impl Session {
    pub fn new(
        roster: Roster,
        index: EncodingIndex,
        predicate: Box<dyn MatchPredicate>,
        log: AttendanceLog,
    ) -> Self {
        Self {
            roster,
            index,
            predicate,
            log,
            marked: HashSet::new(),
            marked_order: Vec::new(),
            clock: local_now,
        }
    }

    /// Replace the wall clock used to stamp attendance rows.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_marked(&self, name: &str) -> bool {
        self.marked.contains(name)
    }

    /// Detect, encode and match every face in `frame`, logging first sightings.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        engine: &mut dyn FaceEngine,
    ) -> Result<Vec<Sighting>, SessionError> {
        let faces = engine.faces(&frame.image)?;

        let mut sightings = Vec::with_capacity(faces.len());
        for (face, embedding) in faces {
            let name = self
                .index
                .first_match(&embedding, self.predicate.as_ref())
                .map(str::to_string);
            let newly_marked = match &name {
                Some(n) => self.mark(n)?,
                None => false,
            };
            sightings.push(Sighting { face, name, newly_marked });
        }
        Ok(sightings)
    }

    /// Append an attendance row for `name` unless it was already marked this
    /// session. Returns whether a row was written.
    fn mark(&mut self, name: &str) -> Result<bool, SessionError> {
        if self.marked.contains(name) {
            return Ok(false);
        }

        let identifier = self.roster.identifier(name).unwrap_or_else(|| {
            tracing::warn!(name, "recognised name has no roster entry");
            MISSING_IDENTIFIER
        });
        let record = AttendanceRecord::stamped(identifier, name, (self.clock)());
        self.log.append(&record)?;

        tracing::info!(
            name,
            identifier,
            date = %record.date,
            time = %record.time,
            "attendance marked"
        );
        println!("{name}'s attendance marked.");

        self.marked.insert(name.to_string());
        self.marked_order.push(name.to_string());
        Ok(true)
    }

    /// Pull frames until the viewer asks to stop. The frame source is only
    /// borrowed; whoever opened it releases it when this returns, error or not.
    pub fn run<S: FrameSource>(
        &mut self,
        source: &mut S,
        engine: &mut dyn FaceEngine,
        viewer: &mut dyn Viewer,
    ) -> Result<RunSummary, SessionError> {
        let mut summary = RunSummary::default();
        loop {
            let frame = source
                .next_frame()
                .map_err(|e| SessionError::Capture(Box::new(e)))?;
            let sightings = self.process_frame(&frame, engine)?;

            summary.frames += 1;
            summary.faces += sightings.len() as u64;
            for s in &sightings {
                tracing::trace!(
                seq = frame.sequence,
                label = s.label(),
                newly_marked = s.newly_marked,
                "face"
            );
            }

            if viewer.present(&frame, &sightings)? == Control::Stop {
                break;
            }
        }

        summary.marked = self.marked_order.clone();
        tracing::info!(
            frames = summary.frames,
            marked = summary.marked.len(),
            table = %self.log.path().display(),
            "recognition loop stopped"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Headless;
    use crate::testing::{
        keyed_embedding, keyed_frame, keyed_image, scratch_dir, PixelKeyedEngine, ScriptedSource,
    };
    use rollcall_core::CosineThreshold;
    use tempfile::TempDir;

    fn session_with(roster: &str, enrolled: &[(&str, u8)], log: AttendanceLog) -> Session {
        let mut index = EncodingIndex::default();
        for &(name, key) in enrolled {
            index.push(name, keyed_embedding(key));
        }
        Session::new(
            Roster::parse(roster).unwrap(),
            index,
            Box::new(CosineThreshold::default()),
            log,
        )
    }

    fn scratch_log() -> (TempDir, AttendanceLog) {
        let dir = scratch_dir();
        let log = AttendanceLog::new(dir.path().join("attendance.xlsx"));
        (dir, log)
    }

    fn today() -> String {
        chrono::Local::now().format("%Y-%m-%d").to_string()
    }

    #[test]
    fn test_unknown_face_not_logged() {
        let (_dir, log) = scratch_log();
        let mut session = session_with("A1,Alice", &[("Alice", 1)], log.clone());

        let sightings = session
            .process_frame(&keyed_frame(2, 0), &mut PixelKeyedEngine::default())
            .unwrap();

        assert_eq!(sightings.len(), 1);
        assert_eq!(sightings[0].label(), UNKNOWN_LABEL);
        assert!(!sightings[0].newly_marked);
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_consecutive_frames_log_once() {
        let (_dir, log) = scratch_log();
        let mut session = session_with("A1,Alice", &[("Alice", 1)], log.clone());
        let mut engine = PixelKeyedEngine::default();

        let marks: Vec<bool> = (0..5)
            .map(|i| {
                session.process_frame(&keyed_frame(1, i), &mut engine).unwrap()[0].newly_marked
            })
            .collect();

        assert_eq!(marks, vec![true, false, false, false, false]);
        assert!(session.is_marked("Alice"));
        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_new_session_logs_again() {
        let (_dir, log) = scratch_log();
        let mut engine = PixelKeyedEngine::default();

        for _ in 0..2 {
            let mut session = session_with("A1,Alice", &[("Alice", 1)], log.clone());
            session.process_frame(&keyed_frame(1, 0), &mut engine).unwrap();
        }

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.name == "Alice" && r.date == today()));
    }

    #[test]
    fn test_name_missing_from_roster_logged_as_na() {
        let (_dir, log) = scratch_log();
        let mut session = session_with("B2,Bob", &[("Alice", 1)], log.clone());
        session
            .process_frame(&keyed_frame(1, 0), &mut PixelKeyedEngine::default())
            .unwrap();

        let rows = log.read_all().unwrap();
        assert_eq!(rows[0].identifier, MISSING_IDENTIFIER);
        assert_eq!(rows[0].name, "Alice");
    }

    #[test]
    fn test_fixed_clock_stamps_rows() {
        fn noon() -> NaiveDateTime {
            chrono::NaiveDate::from_ymd_opt(2025, 9, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap()
        }
        let (_dir, log) = scratch_log();
        let mut session = session_with("A1,Alice", &[("Alice", 1)], log.clone()).with_clock(noon);
        session
            .process_frame(&keyed_frame(1, 0), &mut PixelKeyedEngine::default())
            .unwrap();

        let row = &log.read_all().unwrap()[0];
        assert_eq!(
            (row.date.as_str(), row.time.as_str(), row.day.as_str()),
            ("2025-09-01", "12:00:00", "Monday")
        );
    }

    #[test]
    fn test_no_face_frame_yields_nothing() {
        let (_dir, log) = scratch_log();
        let mut session = session_with("A1,Alice", &[("Alice", 1)], log);
        let sightings = session
            .process_frame(&Frame::new(keyed_image(0), 0), &mut PixelKeyedEngine::default())
            .unwrap();
        assert!(sightings.is_empty());
    }

    #[test]
    fn test_run_marks_only_on_matching_frame() {
        let tmp = scratch_dir();
        let dir = tmp.path();
        let faces = dir.join("faces");
        std::fs::create_dir(&faces).unwrap();
        keyed_image(1).save(faces.join("Alice_0.jpg")).unwrap();
        std::fs::write(dir.join("roster.txt"), "A1,Alice\n").unwrap();

        let mut engine = PixelKeyedEngine::default();
        let roster = Roster::load(&dir.join("roster.txt")).unwrap();
        let index = EncodingIndex::build(&faces, &mut engine).unwrap();
        let log = AttendanceLog::new(dir.join("attendance.xlsx"));
        let predicate = Box::new(CosineThreshold::default());
        let mut session = Session::new(roster, index, predicate, log.clone());

        // frame 1: nobody, frame 2: a stranger, frame 3: Alice, frames 4-5: stranger, nobody
        let mut source = ScriptedSource::from_keys(&[0, 2, 1, 2, 0]);
        let summary = session
            .run(&mut source, &mut engine, &mut Headless::new(Some(5)))
            .unwrap();

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.faces, 3);
        assert_eq!(summary.marked, vec!["Alice".to_string()]);

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].identifier, "A1");
        assert_eq!(rows[0].name, "Alice");
        assert_eq!(rows[0].date, today());
    }

    #[test]
    fn test_run_propagates_capture_failure() {
        let (_dir, log) = scratch_log();
        let mut session = session_with("A1,Alice", &[("Alice", 1)], log);
        let mut source = ScriptedSource::from_keys(&[1, 1]);
        let err = session
            .run(&mut source, &mut PixelKeyedEngine::default(), &mut Headless::new(None))
            .unwrap_err();
        assert!(matches!(err, SessionError::Capture(_)));
        assert_eq!(source.delivered, 2);
        assert!(session.is_marked("Alice"));
    }
}
