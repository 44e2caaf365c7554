pub mod appointments;
pub mod city;
pub mod defects;
pub mod egov;
pub mod news;
pub mod profile;
pub mod waste;
