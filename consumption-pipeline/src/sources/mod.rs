pub mod building_reference_file;
pub mod readings_csv_file;

pub use building_reference_file::BuildingReferenceFileSource;
pub use readings_csv_file::ReadingsCsvFileSource;
