#[macro_use]
extern crate rocket;

mod bucket;
mod config;
mod controllers;
mod db;
mod error;
mod form;
mod integrations;
mod models;
mod money;
mod router;
mod shell;
mod web;

use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use tracing::error;

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}

pub(crate) fn build_rocket(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(AdHoc::try_on_ignite("Organizer state", |rocket| async move {
            match web::Organizer::from_figment(rocket.figment()) {
                Ok(state) => Ok(rocket.manage(state)),
                Err(err) => {
                    error!(error = %err, "cannot start organizer");
                    Err(rocket)
                }
            }
        }))
        .mount("/", web::routes())
        .mount("/static", FileServer::from("static"))
        .register("/", web::catchers())
        .attach(Template::fairing())
}

#[launch]
fn rocket() -> _ {
    init_tracing();
    build_rocket(rocket::Config::figment())
}
