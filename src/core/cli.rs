use clap::{arg, command, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    #[arg(short, long)]
    pub configuration_file: Option<String>,
    #[arg(short, long)]
    pub verbosity: Option<log::LevelFilter>,
    /// overrides the backend url of the configuration file
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// emails a magic link to sign in
    SignIn {
        /// the address to send the link to
        email: String,
    },
    /// completes the sign-in with the url the magic link redirected to
    CompleteSignIn {
        /// the full redirect url, fragment included
        redirect_url: String,
    },
    /// ends the current session
    SignOut,
    /// shows the current session
    Status {
        /// show the full access token
        #[arg(long)]
        show_token: bool,
    },
    /// asks the backend who the current user is
    Me,
    /// checks the backend is up
    Health {
        /// also check the backend database
        #[arg(long)]
        db: bool,
    },
    /// authenticated GET on the backend
    Get {
        /// path appended to the backend url
        path: String,
    },
    /// authenticated POST on the backend
    Post {
        /// path appended to the backend url
        path: String,
        /// JSON body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// lists the learning objectives
    Objectives,
    /// generates a problem for an objective
    Generate {
        /// objective code, e.g. KCL-01
        objective_code: String,
    },
    /// grades an answer to a problem
    Grade {
        problem_id: String,
        value: f64,
        #[arg(short, long, default_value = "V")]
        units: String,
    },
    /// prints session changes until interrupted
    Watch,
}
