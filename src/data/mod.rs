pub mod game;
pub mod loader;
pub mod skill;
pub mod validate;

pub use game::{EnemyTemplate, GameData, LevelConfig, PlayerTemplate, Wave, WaveEnemy};
pub use loader::{load_game_data, parse_game_data, DataFormat, DEFAULT_DATA_PATH};
pub use skill::{
    BuffRef, BuffRefTarget, Selection, SelectionMode, SkillCatalog, SkillConfig, SkillKind, TargetDescriptor,
    TargetScope, TargetSubject,
};
pub use validate::{
    validate_game_data, validate_game_data_file, ValidationDiagnostic, ValidationReport, ValidationSeverity,
};
