use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use amygdala::{AudioStager, StagingError};

#[test]
fn test_concurrent_staging_is_unique_and_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let stager = Arc::new(AudioStager::new(dir.path()).unwrap());

    let mut handles = vec![];
    for i in 0..8u8 {
        let stager = Arc::clone(&stager);
        handles.push(thread::spawn(move || {
            let staged = stager.stage(&[i; 256]).unwrap();
            assert_eq!(std::fs::read(staged.path()).unwrap(), vec![i; 256]);
            let path = staged.path().to_path_buf();
            staged.release().unwrap();
            path
        }));
    }

    let paths: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(paths.len(), 8);
    assert!(paths.iter().all(|p| !p.exists()));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_failed_staging_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let staging_dir = dir.path().join("uploads");
    let stager = AudioStager::new(&staging_dir).unwrap();
    std::fs::remove_dir(&staging_dir).unwrap();

    let result = stager.stage(b"RIFF");
    assert!(matches!(result, Err(StagingError::Io(_))));
    assert!(!staging_dir.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_drop_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let stager = AudioStager::new(dir.path()).unwrap();
    let path = {
        let staged = stager.stage(b"clip").unwrap();
        staged.path().to_path_buf()
    };
    assert!(!path.exists());
}
