pub mod csv_export;
pub mod octopus;
pub mod pvgis;
pub mod source;
pub mod wallbox_csv;
