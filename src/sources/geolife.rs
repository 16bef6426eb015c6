//! GeoLife dataset directory integration
//!
//! The dataset is laid out as `<root>/<user_id>/Trajectory/*.plt`, one file per
//! recorded day.

use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use super::{PltSource, PositionsSource};
use crate::UserTrajectory;

/// Whole dataset source
pub struct GeolifeSource {
    root: PathBuf,
}

impl GeolifeSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// User folders with the id parsed from their names
    pub fn users(&self) -> Result<Vec<(i64, PathBuf)>, String> {
        let mut users = vec![];

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                format!("Failed on list {}: {}", self.root.display(), e.to_string())
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            let user_id = name
                .parse::<i64>()
                .map_err(|e| format!("Invalid user folder name `{}`: {}", name, e.to_string()))?;

            users.push((user_id, entry.into_path()));
        }

        Ok(users)
    }

    /// Every `.plt` file of one user folder
    pub fn trajectory_files(user_folder: &Path) -> Result<Vec<PathBuf>, String> {
        let folder = user_folder.join("Trajectory");
        let mut files = vec![];

        for entry in WalkDir::new(&folder).min_depth(1).max_depth(1) {
            let entry = entry
                .map_err(|e| format!("Failed on list {}: {}", folder.display(), e.to_string()))?;

            let is_plt = entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("plt"))
                .unwrap_or(false);

            if entry.file_type().is_file() && is_plt {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    /// Concatenate all the daily files of one user
    pub fn load_user(user_id: i64, user_folder: &Path) -> Result<UserTrajectory, String> {
        let files = Self::trajectory_files(user_folder)?;
        if files.is_empty() {
            return Err(format!(
                "No trajectory file found for user {} in {}",
                user_id,
                user_folder.display()
            ));
        }

        let mut traj = UserTrajectory::new(user_id);
        for file in files {
            log::debug!("Reading {}", file.display());

            let fixes = PltSource::from_path(&file, user_id)?
                .fetch()
                .map_err(|e| format!("Failed on parse {}: {}", file.display(), e))?;
            traj.append(fixes)?;
        }

        Ok(traj)
    }
}

impl PositionsSource for GeolifeSource {
    fn fetch(&mut self) -> Result<Vec<UserTrajectory>, String> {
        let mut trajs = vec![];

        for (user_id, folder) in self.users()? {
            let started = Instant::now();
            log::info!("start user_id: {}", user_id);

            let traj = Self::load_user(user_id, &folder)?;

            log::info!(
                "finished user_id: {} ({} fixes) Duration: {:.0}s",
                user_id,
                traj.len(),
                started.elapsed().as_secs_f64()
            );
            trajs.push(traj);
        }

        Ok(trajs)
    }
}
