//! Attendance recording form: a small state machine that walks
//! project → labour → photo → upload → submit and refuses to submit while
//! any structural invariant is unmet.

use chrono::{Local, NaiveDate, NaiveTime};
use thiserror::Error;
use tracing::warn;

use crate::api::attendance::CreateAttendance;
use crate::location::acquire::{self, LocationSample, PositionSensor};
use crate::location::geocode::AddressResolver;
use crate::model::attendance::AttendanceStatus;
use crate::workflow::client::{AttendanceApi, PhotoUploader, SubmitOutcome};
use crate::workflow::watermark::{self, Caption};

/// Standard workday assumed when in/out times are missing or inconsistent.
pub const DEFAULT_WORKDAY_HOURS: f64 = 8.0;

/// Exactly one verification photo for this workflow; task/issue attachment
/// flows have their own (optional) policies.
pub const DEFAULT_MAX_PHOTOS: usize = 1;

/// Who is being marked present: a registered labour or an ad-hoc name.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignee {
    Unassigned,
    ByReference { employee_id: u64, name: String },
    ByName(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorKind {
    Duplicate,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormState {
    Idle,
    ProjectSelected,
    LabourSelected,
    PhotoCapturing,
    PhotoUploading,
    Submitting,
    Success,
    Error(ErrorKind),
}

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("select a project first")]
    NoProject,
    #[error("select a labour first")]
    NoLabour,
    #[error("a verification photo is required")]
    PhotoRequired,
    #[error("please wait, photo upload still in progress")]
    UploadInFlight,
    #[error("at most {0} photo(s) allowed")]
    TooManyPhotos(usize),
    #[error("captured photo could not be read")]
    BadPhoto,
    #[error("photo upload failed: {0}")]
    UploadFailed(String),
}

/// One captured photo. `upload_id` stays `None` until the backend has
/// acknowledged the upload; submission is blocked while any slot is pending.
#[derive(Debug)]
pub struct PhotoSlot {
    pub stamped: Vec<u8>,
    pub filename: String,
    pub upload_id: Option<String>,
}

pub struct AttendanceForm {
    state: FormState,
    project: Option<(u64, String)>,
    assignee: Assignee,
    pub date: NaiveDate,
    pub time_in: Option<String>,
    pub time_out: Option<String>,
    pub status: AttendanceStatus,
    pub overtime_hours: Option<f64>,
    pub mobile: Option<String>,
    max_photos: usize,
    slots: Vec<PhotoSlot>,
    last_fix: Option<LocationSample>,
    location_text: Option<String>,
}

impl AttendanceForm {
    pub fn new() -> Self {
        Self::with_max_photos(DEFAULT_MAX_PHOTOS)
    }

    pub fn with_max_photos(max_photos: usize) -> Self {
        Self {
            state: FormState::Idle,
            project: None,
            assignee: Assignee::Unassigned,
            date: Local::now().date_naive(),
            time_in: None,
            time_out: None,
            status: AttendanceStatus::Present,
            overtime_hours: None,
            mobile: None,
            max_photos,
            slots: Vec::new(),
            last_fix: None,
            location_text: None,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn photos(&self) -> &[PhotoSlot] {
        &self.slots
    }

    /// Picking a project (or re-picking one) always clears the labour
    /// selection; the labour list is scoped to the project.
    pub fn select_project(&mut self, id: u64, name: &str) {
        self.project = Some((id, name.to_string()));
        self.assignee = Assignee::Unassigned;
        self.state = FormState::ProjectSelected;
    }

    pub fn select_labour(&mut self, assignee: Assignee) -> Result<(), FormError> {
        if self.project.is_none() {
            return Err(FormError::NoProject);
        }
        if assignee == Assignee::Unassigned {
            return Err(FormError::NoLabour);
        }
        self.assignee = assignee;
        self.state = FormState::LabourSelected;
        Ok(())
    }

    /// Capture pipeline for one photo: acquire a fix, resolve its address,
    /// burn the proof caption into the image, upload, record the file id.
    /// Sensor and geocoder failures degrade (the stamp falls back to
    /// date/time only); only an unreadable photo or a failed upload error
    /// out, and a failed upload leaves the slot pending for retry.
    pub async fn attach_photo(
        &mut self,
        photo: &[u8],
        sensor: &dyn PositionSensor,
        resolver: &AddressResolver,
        uploader: &dyn PhotoUploader,
    ) -> Result<String, FormError> {
        match self.state {
            FormState::LabourSelected
            | FormState::PhotoCapturing
            | FormState::PhotoUploading
            | FormState::Error(_) => {}
            _ => return Err(FormError::NoLabour),
        }
        if self.slots.len() >= self.max_photos {
            return Err(FormError::TooManyPhotos(self.max_photos));
        }

        self.state = FormState::PhotoCapturing;

        let address = match acquire::acquire_location(sensor).await {
            Ok(fix) => {
                let text = resolver.resolve(fix.latitude, fix.longitude).await;
                self.last_fix = Some(fix);
                self.location_text = Some(text.clone());
                text
            }
            Err(e) => {
                warn!(error = %e, "no position fix, stamping without location");
                String::new()
            }
        };

        let stamped =
            watermark::stamp(photo, &Caption::now(&address)).map_err(|_| FormError::BadPhoto)?;

        let filename = format!("attendance-{}.jpg", self.slots.len() + 1);
        self.state = FormState::PhotoUploading;
        self.slots.push(PhotoSlot {
            stamped: stamped.clone(),
            filename: filename.clone(),
            upload_id: None,
        });

        let project_id = self.project.as_ref().map(|(id, _)| *id);
        match uploader.upload(stamped, &filename, project_id).await {
            Ok(id) => {
                if let Some(slot) = self.slots.last_mut() {
                    slot.upload_id = Some(id.clone());
                }
                Ok(id)
            }
            // Slot stays pending; retry_uploads can pick it up again.
            Err(e) => Err(FormError::UploadFailed(e.to_string())),
        }
    }

    /// Re-attempt every pending upload. Individual failures are reported
    /// but do not abort the rest of the batch.
    pub async fn retry_uploads(&mut self, uploader: &dyn PhotoUploader) -> Vec<FormError> {
        let project_id = self.project.as_ref().map(|(id, _)| *id);
        let mut failures = Vec::new();
        for slot in self.slots.iter_mut().filter(|s| s.upload_id.is_none()) {
            match uploader
                .upload(slot.stamped.clone(), &slot.filename, project_id)
                .await
            {
                Ok(id) => slot.upload_id = Some(id),
                Err(e) => failures.push(FormError::UploadFailed(e.to_string())),
            }
        }
        failures
    }

    /// Build the submission payload. Fails on the same guards as
    /// [`AttendanceForm::submit`] so callers can preview validation.
    pub fn build_record(&self) -> Result<CreateAttendance, FormError> {
        let (project_id, _) = self.project.clone().ok_or(FormError::NoProject)?;
        let (employee_id, labour_name) = match &self.assignee {
            Assignee::Unassigned => return Err(FormError::NoLabour),
            Assignee::ByReference { employee_id, name } => (Some(*employee_id), name.clone()),
            Assignee::ByName(name) => (None, name.clone()),
        };
        if self.slots.is_empty() {
            return Err(FormError::PhotoRequired);
        }
        let attachments: Vec<String> = self
            .slots
            .iter()
            .filter_map(|s| s.upload_id.clone())
            .collect();
        if attachments.len() != self.slots.len() {
            return Err(FormError::UploadInFlight);
        }

        Ok(CreateAttendance {
            employee_id,
            labour_name,
            project_id,
            date: self.date,
            time_in: self.time_in.clone(),
            time_out: self.time_out.clone(),
            status: self.status,
            hours: Some(compute_hours(
                self.time_in.as_deref(),
                self.time_out.as_deref(),
            )),
            overtime_hours: self.overtime_hours,
            attachments,
            mobile: self.mobile.as_deref().and_then(sanitize_mobile),
            location_text: self.location_text.clone(),
            latitude: self.last_fix.map(|f| f.latitude),
            longitude: self.last_fix.map(|f| f.longitude),
            accuracy_m: self.last_fix.map(|f| f.accuracy_m),
        })
    }

    pub async fn submit(&mut self, api: &dyn AttendanceApi) -> Result<SubmitOutcome, FormError> {
        let record = self.build_record()?;
        self.state = FormState::Submitting;
        let outcome = api.create(&record).await;
        self.state = match &outcome {
            SubmitOutcome::Submitted => FormState::Success,
            SubmitOutcome::Duplicate(_) => FormState::Error(ErrorKind::Duplicate),
            SubmitOutcome::Failed(_) => FormState::Error(ErrorKind::Other),
        };
        Ok(outcome)
    }

    pub fn reset(&mut self) {
        *self = Self::with_max_photos(self.max_photos);
    }
}

impl Default for AttendanceForm {
    fn default() -> Self {
        Self::new()
    }
}

/// Worked hours from "HH:MM" strings on a 24-hour clock, rounded to two
/// decimals. Missing, unparsable or non-positive spans fall back to the
/// standard workday; cross-midnight shifts are not computed.
pub fn compute_hours(time_in: Option<&str>, time_out: Option<&str>) -> f64 {
    let (Some(t_in), Some(t_out)) = (time_in, time_out) else {
        return DEFAULT_WORKDAY_HOURS;
    };
    let (Ok(t_in), Ok(t_out)) = (
        NaiveTime::parse_from_str(t_in, "%H:%M"),
        NaiveTime::parse_from_str(t_out, "%H:%M"),
    ) else {
        return DEFAULT_WORKDAY_HOURS;
    };
    let minutes = (t_out - t_in).num_minutes();
    if minutes <= 0 {
        return DEFAULT_WORKDAY_HOURS;
    }
    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}

/// Digits-only normalization; anything but exactly 10 digits is discarded.
pub fn sanitize_mobile(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == 10).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::acquire::{ReadOptions, SensorError};
    use crate::location::geocode::GeocodeProvider;
    use crate::workflow::client::UploadError;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    fn test_photo() -> Vec<u8> {
        let img = RgbImage::from_pixel(64, 48, Rgb([180, 180, 180]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    struct GoodSensor;

    #[async_trait]
    impl PositionSensor for GoodSensor {
        async fn read_position(&self, _opts: ReadOptions) -> Result<LocationSample, SensorError> {
            Ok(LocationSample {
                latitude: 12.9352,
                longitude: 77.6245,
                accuracy_m: 12.0,
                captured_at_ms: 0,
            })
        }
    }

    struct DeadSensor;

    #[async_trait]
    impl PositionSensor for DeadSensor {
        async fn read_position(&self, _opts: ReadOptions) -> Result<LocationSample, SensorError> {
            Err(SensorError::Unavailable("permission denied".into()))
        }
    }

    struct FixedProvider;

    #[async_trait]
    impl GeocodeProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn reverse(&self, _lat: f64, _lng: f64) -> anyhow::Result<Option<String>> {
            Ok(Some("Koramangala, Bengaluru".into()))
        }
    }

    fn resolver() -> AddressResolver {
        AddressResolver::with_providers(vec![Box::new(FixedProvider)])
    }

    struct FakeUploader {
        fail_first: Mutex<bool>,
    }

    impl FakeUploader {
        fn reliable() -> Self {
            Self {
                fail_first: Mutex::new(false),
            }
        }
        fn flaky() -> Self {
            Self {
                fail_first: Mutex::new(true),
            }
        }
    }

    #[async_trait]
    impl PhotoUploader for FakeUploader {
        async fn upload(
            &self,
            _photo: Vec<u8>,
            _filename: &str,
            _project_id: Option<u64>,
        ) -> Result<String, UploadError> {
            let mut fail = self.fail_first.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(UploadError::Failed("socket closed".into()));
            }
            Ok("file-1".into())
        }
    }

    struct FakeApi(SubmitOutcome);

    #[async_trait]
    impl AttendanceApi for FakeApi {
        async fn create(&self, _record: &CreateAttendance) -> SubmitOutcome {
            self.0.clone()
        }
    }

    fn labour() -> Assignee {
        Assignee::ByReference {
            employee_id: 7,
            name: "Ravi Kumar".into(),
        }
    }

    #[test]
    fn labour_cannot_be_chosen_before_a_project() {
        let mut form = AttendanceForm::new();
        assert_eq!(form.select_labour(labour()), Err(FormError::NoProject));
    }

    #[test]
    fn reselecting_a_project_clears_the_labour() {
        let mut form = AttendanceForm::new();
        form.select_project(1, "Metro Line 3");
        form.select_labour(labour()).unwrap();
        assert_eq!(form.state(), FormState::LabourSelected);

        form.select_project(2, "Airport Phase 2");
        assert_eq!(form.state(), FormState::ProjectSelected);
        assert_eq!(
            form.select_labour(Assignee::Unassigned),
            Err(FormError::NoLabour)
        );
    }

    #[actix_web::test]
    async fn submit_requires_a_photo() {
        let mut form = AttendanceForm::new();
        form.select_project(1, "Metro Line 3");
        form.select_labour(labour()).unwrap();
        let err = form
            .submit(&FakeApi(SubmitOutcome::Submitted))
            .await
            .unwrap_err();
        assert_eq!(err, FormError::PhotoRequired);
    }

    #[actix_web::test]
    async fn submit_is_blocked_while_an_upload_is_pending() {
        let mut form = AttendanceForm::new();
        form.select_project(1, "Metro Line 3");
        form.select_labour(labour()).unwrap();

        let uploader = FakeUploader::flaky();
        let err = form
            .attach_photo(&test_photo(), &GoodSensor, &resolver(), &uploader)
            .await
            .unwrap_err();
        assert!(matches!(err, FormError::UploadFailed(_)));

        // The "please wait" condition: no attendance call may happen
        let err = form
            .submit(&FakeApi(SubmitOutcome::Submitted))
            .await
            .unwrap_err();
        assert_eq!(err, FormError::UploadInFlight);

        // After a successful retry the submission goes through
        assert!(form.retry_uploads(&uploader).await.is_empty());
        let outcome = form
            .submit(&FakeApi(SubmitOutcome::Submitted))
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);
        assert_eq!(form.state(), FormState::Success);
    }

    #[actix_web::test]
    async fn happy_path_attaches_location_and_file_reference() {
        let mut form = AttendanceForm::new();
        form.select_project(3, "Ring Road Widening");
        form.select_labour(labour()).unwrap();
        form.time_in = Some("09:00".into());
        form.time_out = Some("17:30".into());
        form.mobile = Some("98-765 43210".into());

        let id = form
            .attach_photo(&test_photo(), &GoodSensor, &resolver(), &FakeUploader::reliable())
            .await
            .unwrap();
        assert_eq!(id, "file-1");

        let record = form.build_record().unwrap();
        assert_eq!(record.employee_id, Some(7));
        assert_eq!(record.project_id, 3);
        assert_eq!(record.attachments, vec!["file-1".to_string()]);
        assert_eq!(record.hours, Some(8.5));
        assert_eq!(record.mobile.as_deref(), Some("9876543210"));
        assert_eq!(record.latitude, Some(12.9352));
        assert_eq!(record.location_text.as_deref(), Some("Koramangala, Bengaluru"));
    }

    #[actix_web::test]
    async fn sensor_failure_never_blocks_the_workflow() {
        let mut form = AttendanceForm::new();
        form.select_project(1, "Metro Line 3");
        form.select_labour(Assignee::ByName("Anand".into())).unwrap();

        form.attach_photo(&test_photo(), &DeadSensor, &resolver(), &FakeUploader::reliable())
            .await
            .unwrap();

        let record = form.build_record().unwrap();
        assert_eq!(record.employee_id, None);
        assert_eq!(record.labour_name, "Anand");
        assert_eq!(record.latitude, None);
        assert_eq!(record.location_text, None);
    }

    #[actix_web::test]
    async fn only_one_photo_is_allowed_by_default() {
        let mut form = AttendanceForm::new();
        form.select_project(1, "Metro Line 3");
        form.select_labour(labour()).unwrap();
        let uploader = FakeUploader::reliable();
        form.attach_photo(&test_photo(), &GoodSensor, &resolver(), &uploader)
            .await
            .unwrap();
        let err = form
            .attach_photo(&test_photo(), &GoodSensor, &resolver(), &uploader)
            .await
            .unwrap_err();
        assert_eq!(err, FormError::TooManyPhotos(1));
    }

    #[actix_web::test]
    async fn duplicate_rejection_lands_in_its_own_error_state() {
        let mut form = AttendanceForm::new();
        form.select_project(1, "Metro Line 3");
        form.select_labour(labour()).unwrap();
        form.attach_photo(&test_photo(), &GoodSensor, &resolver(), &FakeUploader::reliable())
            .await
            .unwrap();

        let outcome = form
            .submit(&FakeApi(SubmitOutcome::Duplicate(
                "Attendance already marked for this labour today".into(),
            )))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Duplicate(_)));
        assert_eq!(form.state(), FormState::Error(ErrorKind::Duplicate));

        // Form stays editable; resubmission is allowed
        let outcome = form
            .submit(&FakeApi(SubmitOutcome::Submitted))
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);
    }

    #[test]
    fn hours_from_a_normal_shift() {
        assert_eq!(compute_hours(Some("09:00"), Some("17:30")), 8.5);
        assert_eq!(compute_hours(Some("08:15"), Some("08:35")), 0.33);
    }

    #[test]
    fn hours_fall_back_on_missing_or_inverted_times() {
        assert_eq!(compute_hours(None, None), DEFAULT_WORKDAY_HOURS);
        assert_eq!(compute_hours(Some("09:00"), None), DEFAULT_WORKDAY_HOURS);
        // Night shift crossing midnight is not computed
        assert_eq!(compute_hours(Some("09:00"), Some("08:00")), DEFAULT_WORKDAY_HOURS);
        assert_eq!(compute_hours(Some("junk"), Some("17:00")), DEFAULT_WORKDAY_HOURS);
    }

    #[test]
    fn mobile_numbers_keep_only_complete_ten_digit_values() {
        assert_eq!(sanitize_mobile("98-765 43210").as_deref(), Some("9876543210"));
        assert_eq!(sanitize_mobile("12345"), None);
        assert_eq!(sanitize_mobile("+91 98765 43210"), None); // 12 digits
        assert_eq!(sanitize_mobile(""), None);
    }
}
