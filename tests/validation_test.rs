use amygdala::{ConfigError, EmotionLabelSet, LabelSetError, ServiceConfig};

#[test]
fn test_duplicate_label() {
    let result = EmotionLabelSet::new(["happy", "sad", "happy"]);
    assert_eq!(result.unwrap_err(), LabelSetError::Duplicate("happy".to_string()));
}

#[test]
fn test_empty_label_set() {
    let result = EmotionLabelSet::new(Vec::<String>::new());
    assert_eq!(result.unwrap_err(), LabelSetError::Empty);
    assert!("".parse::<EmotionLabelSet>().is_err());
}

#[test]
fn test_blank_label() {
    let result = "angry, ,sad".parse::<EmotionLabelSet>();
    assert!(matches!(result, Err(LabelSetError::BlankLabel(1))));
}

#[test]
fn test_many_labels_keep_their_order() -> Result<(), LabelSetError> {
    let names: Vec<String> = (0..32).map(|i| format!("emotion_{}", i)).collect();
    let labels = EmotionLabelSet::new(names.clone())?;
    assert_eq!(labels.len(), 32);
    for (i, name) in names.iter().enumerate() {
        assert_eq!(labels.position(name), Some(i));
    }
    Ok(())
}

#[test]
fn test_parsed_labels_are_trimmed() -> Result<(), LabelSetError> {
    let labels: EmotionLabelSet = " neutral , happy,sad ".parse()?;
    assert_eq!(labels.as_slice(), &["neutral", "happy", "sad"]);
    assert_eq!(labels.to_string(), "[neutral, happy, sad]");
    Ok(())
}

#[test]
fn test_service_config_validation() {
    assert!(ServiceConfig::default().validate().is_ok());

    let config = ServiceConfig {
        host: "not an address".into(),
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidHost(_))));

    let config = ServiceConfig {
        sample_rate: Some(0),
        ..Default::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::ZeroSampleRate));

    let config = ServiceConfig {
        host: "::1".into(),
        port: 9000,
        sidecar_url: Some("https://inference.internal:8443".into()),
        ..Default::default()
    };
    assert!(config.validate().is_ok());
    assert_eq!(config.socket_addr().unwrap().to_string(), "[::1]:9000");
}
