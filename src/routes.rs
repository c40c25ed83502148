use actix_web::{HttpResponse, Responder, web};

use crate::auth::Authenticate;
use crate::error::{json_error_handler, path_error_handler, query_error_handler};
use crate::handlers::{
    appointments, auth, dashboard, exams, medications, patients, prescriptions, reports, staff, telemedicine,
};

/// Mounts every route plus the extractor configs that shape 400 responses.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .route("/", web::get().to(health))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth::register))
                        .route("/login", web::post().to(auth::login))
                        .service(web::resource("/me").wrap(Authenticate).route(web::get().to(auth::me))),
                )
                .service(
                    web::scope("/patients")
                        .wrap(Authenticate)
                        .route("", web::get().to(patients::list_patients))
                        .route("", web::post().to(patients::create_patient))
                        .route("/{id}", web::get().to(patients::get_patient))
                        .route("/{id}", web::put().to(patients::update_patient))
                        .route("/{id}", web::delete().to(patients::delete_patient)),
                )
                .service(
                    web::scope("/staff")
                        .wrap(Authenticate)
                        .route("", web::get().to(staff::list_staff))
                        .route("", web::post().to(staff::create_staff))
                        .route("/user/{user_id}", web::get().to(staff::get_staff_by_user))
                        .route("/{id}", web::get().to(staff::get_staff))
                        .route("/{id}", web::put().to(staff::update_staff))
                        .route("/{id}", web::delete().to(staff::delete_staff)),
                )
                .service(
                    web::scope("/appointments")
                        .wrap(Authenticate)
                        .route("", web::get().to(appointments::list_appointments))
                        .route("", web::post().to(appointments::create_appointment))
                        .route("/{id}", web::get().to(appointments::get_appointment))
                        .route("/{id}", web::put().to(appointments::update_appointment))
                        .route("/{id}", web::delete().to(appointments::delete_appointment)),
                )
                .service(
                    web::scope("/telemedicine")
                        .wrap(Authenticate)
                        .route("", web::get().to(telemedicine::list_teleconsultations))
                        .route("", web::post().to(telemedicine::create_teleconsultation))
                        .route("/{id}", web::get().to(telemedicine::get_teleconsultation))
                        .route("/{id}", web::put().to(telemedicine::update_teleconsultation))
                        .route("/{id}", web::delete().to(telemedicine::delete_teleconsultation)),
                )
                .service(
                    web::scope("/prescriptions")
                        .wrap(Authenticate)
                        .route("", web::get().to(prescriptions::list_prescriptions))
                        .route("", web::post().to(prescriptions::create_prescription))
                        .route("/{id}", web::get().to(prescriptions::get_prescription))
                        .route("/{id}", web::put().to(prescriptions::update_prescription))
                        .route("/{id}", web::delete().to(prescriptions::delete_prescription)),
                )
                .service(
                    web::scope("/medications")
                        .wrap(Authenticate)
                        .route("", web::get().to(medications::list_medications))
                        .route("", web::post().to(medications::create_medication))
                        .route("/{id}", web::get().to(medications::get_medication)),
                )
                .service(
                    web::scope("/exams")
                        .wrap(Authenticate)
                        .route("", web::get().to(exams::list_exams))
                        .route("", web::post().to(exams::create_exam))
                        .route("/{id}", web::get().to(exams::get_exam))
                        .route("/{id}", web::put().to(exams::update_exam))
                        .route("/{id}", web::delete().to(exams::delete_exam)),
                )
                .service(
                    web::scope("/reports")
                        .wrap(Authenticate)
                        .route("", web::get().to(reports::list_reports))
                        .route("", web::post().to(reports::create_report))
                        .route("/{id}", web::get().to(reports::get_report))
                        .route("/{id}", web::put().to(reports::update_report))
                        .route("/{id}", web::delete().to(reports::delete_report)),
                )
                .service(
                    web::scope("/dashboard")
                        .wrap(Authenticate)
                        .route("", web::get().to(dashboard::summary)),
                ),
        );
}

async fn health() -> impl Responder {
    HttpResponse::Ok().body("VidaPlus API is running")
}
