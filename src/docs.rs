use crate::api::attendance::{
    ApproveAttendance, AttendanceFilter, AttendanceListResponse, CreateAttendance,
};
use crate::api::labour::{LabourEntry, LabourQuery};
use crate::api::location::ResolveQuery;
use crate::api::project::ProjectQuery;
use crate::api::upload::UploadQuery;
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::labour::{Labour, Resource};
use crate::model::project::Project;
use crate::model::upload::Upload;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sitetrack API",
        version = "1.0.0",
        description = r#"
## Construction Site Attendance Tracking

This API powers attendance tracking for construction projects: who worked,
where, and with photographic proof.

### 🔹 Key Features
- **Attendance Management**
  - Record daily attendance per labour with a location-stamped photo
  - One record per registered employee per day, enforced by the storage layer
  - Filter, approve, update, and delete records
- **Project & Labour Registries**
  - Project-scoped labour lists merged from two registries
- **File Uploads**
  - Verification photos and other attachments, referenced by id

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints
- Duplicate attendance is reported with HTTP 409 and code `DUPLICATE_ATTENDANCE`
"#
    ),
    paths(
        crate::api::attendance::create_attendance,
        crate::api::attendance::attendance_list,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::approve_attendance,
        crate::api::project::project_list,
        crate::api::project::get_project,
        crate::api::labour::labour_list,
        crate::api::location::resolve_address,
        crate::api::upload::upload_file,
    ),
    components(schemas(
        Attendance,
        AttendanceStatus,
        CreateAttendance,
        AttendanceFilter,
        AttendanceListResponse,
        ApproveAttendance,
        Project,
        ProjectQuery,
        Labour,
        Resource,
        LabourEntry,
        LabourQuery,
        Upload,
        UploadQuery,
        ResolveQuery,
    )),
    tags(
        (name = "Attendance", description = "Daily attendance records"),
        (name = "Project", description = "Construction projects"),
        (name = "Labour", description = "People who can be marked present"),
        (name = "Location", description = "Reverse geocoding"),
        (name = "Upload", description = "File attachments")
    )
)]
pub struct ApiDoc;
