//! Core data models for cattle observations
//!
//! Every categorical column is a typed enum with an `Other` variant so that
//! values outside the known vocabulary still parse and can be encoded as
//! unknown by the feature pipeline.

use crate::error::SchemaError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! categorical_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)+
            /// Value outside the known vocabulary, kept verbatim
            Other(String),
        }

        impl $name {
            /// All known (non-`Other`) values in declaration order
            pub fn known() -> Vec<Self> {
                vec![$(Self::$variant),+]
            }

            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $label,)+
                    Self::Other(value) => value,
                }
            }

            pub fn parse(value: &str) -> Self {
                match value.trim() {
                    $($label => Self::$variant,)+
                    other => Self::Other(other.to_string()),
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Other(_))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::parse(value)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Ok(Self::parse(&value))
            }
        }
    };
}

categorical_enum!(
    /// Cattle breed
    Breed {
        Holstein => "Holstein",
        Jersey => "Jersey",
        MurrahBuffalo => "Murrah Buffalo",
        Gir => "Gir",
        Sahiwal => "Sahiwal",
    }
);

categorical_enum!(
    /// Stage of the lactation cycle
    LactationStage {
        Early => "Early",
        Peak => "Peak",
        Mid => "Mid",
        Late => "Late",
        Dry => "Dry",
    }
);

categorical_enum!(
    FeedType {
        GreenFodder => "Green Fodder",
        DryFodder => "Dry Fodder",
        MixedRation => "Mixed Ration",
        Silage => "Silage",
        Concentrates => "Concentrates",
    }
);

categorical_enum!(
    Season {
        Winter => "Winter",
        Summer => "Summer",
        Monsoon => "Monsoon",
        Spring => "Spring",
    }
);

categorical_enum!(
    HousingQuality {
        WellVentilated => "Well Ventilated",
        Average => "Average",
        Poor => "Poor",
    }
);

categorical_enum!(
    VaccinationStatus {
        Vaccinated => "Vaccinated",
        Pending => "Pending",
        Overdue => "Overdue",
    }
);

impl Breed {
    /// Daily milk yield baseline in liters
    pub fn yield_baseline(&self) -> f64 {
        match self {
            Breed::Holstein => 25.0,
            Breed::Jersey => 18.0,
            Breed::MurrahBuffalo => 12.0,
            _ => 10.0,
        }
    }
}

/// Disease category assigned to an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiseaseLabel {
    Healthy,
    Mastitis,
    #[serde(rename = "Digestive Disorder")]
    DigestiveDisorder,
    #[serde(rename = "Heat Stress")]
    HeatStress,
}

impl DiseaseLabel {
    pub const ALL: [DiseaseLabel; 4] = [
        DiseaseLabel::Healthy,
        DiseaseLabel::Mastitis,
        DiseaseLabel::DigestiveDisorder,
        DiseaseLabel::HeatStress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseLabel::Healthy => "Healthy",
            DiseaseLabel::Mastitis => "Mastitis",
            DiseaseLabel::DigestiveDisorder => "Digestive Disorder",
            DiseaseLabel::HeatStress => "Heat Stress",
        }
    }
}

impl fmt::Display for DiseaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiseaseLabel {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiseaseLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s.trim())
            .ok_or_else(|| SchemaError::InvalidValue {
                field: "Disease_Label".to_string(),
                reason: format!("unknown disease label '{}'", s),
            })
    }
}

/// Numeric columns of a cattle record, in table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    Age,
    Weight,
    Parity,
    FeedQuantity,
    ProteinContent,
    WalkingDistance,
    GrazingDuration,
    RuminationTime,
    RestHours,
    BodyTemperature,
    HeartRate,
    Temperature,
    Humidity,
}

impl NumericField {
    pub const ALL: [NumericField; 13] = [
        NumericField::Age,
        NumericField::Weight,
        NumericField::Parity,
        NumericField::FeedQuantity,
        NumericField::ProteinContent,
        NumericField::WalkingDistance,
        NumericField::GrazingDuration,
        NumericField::RuminationTime,
        NumericField::RestHours,
        NumericField::BodyTemperature,
        NumericField::HeartRate,
        NumericField::Temperature,
        NumericField::Humidity,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            NumericField::Age => "Age",
            NumericField::Weight => "Weight",
            NumericField::Parity => "Parity",
            NumericField::FeedQuantity => "Feed_Quantity",
            NumericField::ProteinContent => "Protein_Content",
            NumericField::WalkingDistance => "Walking_Distance",
            NumericField::GrazingDuration => "Grazing_Duration",
            NumericField::RuminationTime => "Rumination_Time",
            NumericField::RestHours => "Rest_Hours",
            NumericField::BodyTemperature => "Body_Temperature",
            NumericField::HeartRate => "Heart_Rate",
            NumericField::Temperature => "Temperature",
            NumericField::Humidity => "Humidity",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column_name() == name)
    }
}

/// Categorical columns of a cattle record, in table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalField {
    Breed,
    LactationStage,
    FeedType,
    Season,
    HousingQuality,
    VaccinationStatus,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 6] = [
        CategoricalField::Breed,
        CategoricalField::LactationStage,
        CategoricalField::FeedType,
        CategoricalField::Season,
        CategoricalField::HousingQuality,
        CategoricalField::VaccinationStatus,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            CategoricalField::Breed => "Breed",
            CategoricalField::LactationStage => "Lactation_Stage",
            CategoricalField::FeedType => "Feed_Type",
            CategoricalField::Season => "Season",
            CategoricalField::HousingQuality => "Housing_Quality",
            CategoricalField::VaccinationStatus => "Vaccination_Status",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column_name() == name)
    }
}

/// One cattle observation without labels
///
/// This is the shape of a prediction request. `Animal_ID` is optional on
/// input because the model never looks at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CattleRecord {
    #[serde(rename = "Animal_ID", default, skip_serializing_if = "Option::is_none")]
    pub animal_id: Option<String>,
    #[serde(rename = "Breed")]
    pub breed: Breed,
    #[serde(rename = "Age")]
    pub age_months: u32,
    #[serde(rename = "Weight")]
    pub weight_kg: f64,
    #[serde(rename = "Lactation_Stage")]
    pub lactation_stage: LactationStage,
    #[serde(rename = "Parity")]
    pub parity: u32,
    #[serde(rename = "Feed_Type")]
    pub feed_type: FeedType,
    #[serde(rename = "Feed_Quantity")]
    pub feed_quantity: f64,
    #[serde(rename = "Protein_Content")]
    pub protein_content: f64,
    #[serde(rename = "Walking_Distance")]
    pub walking_distance: f64,
    #[serde(rename = "Grazing_Duration")]
    pub grazing_duration: f64,
    #[serde(rename = "Rumination_Time")]
    pub rumination_time: f64,
    #[serde(rename = "Rest_Hours")]
    pub rest_hours: f64,
    #[serde(rename = "Body_Temperature")]
    pub body_temperature: f64,
    #[serde(rename = "Heart_Rate")]
    pub heart_rate: f64,
    #[serde(rename = "Vaccination_Status")]
    pub vaccination_status: VaccinationStatus,
    #[serde(rename = "Temperature")]
    pub ambient_temperature: f64,
    #[serde(rename = "Humidity")]
    pub humidity: u32,
    #[serde(rename = "Season")]
    pub season: Season,
    #[serde(rename = "Housing_Quality")]
    pub housing_quality: HousingQuality,
}

impl CattleRecord {
    pub fn numeric(&self, field: NumericField) -> f64 {
        match field {
            NumericField::Age => self.age_months as f64,
            NumericField::Weight => self.weight_kg,
            NumericField::Parity => self.parity as f64,
            NumericField::FeedQuantity => self.feed_quantity,
            NumericField::ProteinContent => self.protein_content,
            NumericField::WalkingDistance => self.walking_distance,
            NumericField::GrazingDuration => self.grazing_duration,
            NumericField::RuminationTime => self.rumination_time,
            NumericField::RestHours => self.rest_hours,
            NumericField::BodyTemperature => self.body_temperature,
            NumericField::HeartRate => self.heart_rate,
            NumericField::Temperature => self.ambient_temperature,
            NumericField::Humidity => self.humidity as f64,
        }
    }

    pub fn categorical(&self, field: CategoricalField) -> &str {
        match field {
            CategoricalField::Breed => self.breed.as_str(),
            CategoricalField::LactationStage => self.lactation_stage.as_str(),
            CategoricalField::FeedType => self.feed_type.as_str(),
            CategoricalField::Season => self.season.as_str(),
            CategoricalField::HousingQuality => self.housing_quality.as_str(),
            CategoricalField::VaccinationStatus => self.vaccination_status.as_str(),
        }
    }

    /// Semantic checks beyond what deserialization already enforces
    pub fn validate(&self) -> Result<(), SchemaError> {
        for field in NumericField::ALL {
            let value = self.numeric(field);
            if !value.is_finite() {
                return Err(SchemaError::InvalidValue {
                    field: field.column_name().to_string(),
                    reason: format!("expected a finite number, got {}", value),
                });
            }
        }
        if self.weight_kg <= 0.0 {
            return Err(SchemaError::InvalidValue {
                field: "Weight".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.parity < 1 {
            return Err(SchemaError::InvalidValue {
                field: "Parity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.humidity > 100 {
            return Err(SchemaError::InvalidValue {
                field: "Humidity".to_string(),
                reason: format!("{} is not a percentage", self.humidity),
            });
        }
        for field in CategoricalField::ALL {
            if self.categorical(field).is_empty() {
                return Err(SchemaError::MissingField(field.column_name().to_string()));
            }
        }
        Ok(())
    }
}

/// A cattle observation with its training labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    #[serde(flatten)]
    pub record: CattleRecord,
    #[serde(rename = "Milk_Yield")]
    pub milk_yield: f64,
    #[serde(rename = "Disease_Label")]
    pub disease_label: DiseaseLabel,
}

impl LabeledRecord {
    pub fn animal_id(&self) -> Option<&str> {
        self.record.animal_id.as_deref()
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.animal_id().map_or(true, str::is_empty) {
            return Err(SchemaError::MissingField("Animal_ID".to_string()));
        }
        self.record.validate()?;
        if !self.milk_yield.is_finite() || self.milk_yield < 0.0 {
            return Err(SchemaError::InvalidValue {
                field: "Milk_Yield".to_string(),
                reason: format!("expected a non-negative number, got {}", self.milk_yield),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_record() -> CattleRecord {
        CattleRecord {
            animal_id: Some("CATTLE_1000".to_string()),
            breed: Breed::Holstein,
            age_months: 48,
            weight_kg: 455.0,
            lactation_stage: LactationStage::Mid,
            parity: 3,
            feed_type: FeedType::MixedRation,
            feed_quantity: 15.2,
            protein_content: 14.1,
            walking_distance: 2.3,
            grazing_duration: 4.0,
            rumination_time: 7.2,
            rest_hours: 10.5,
            body_temperature: 38.6,
            heart_rate: 62.0,
            vaccination_status: VaccinationStatus::Vaccinated,
            ambient_temperature: 24.0,
            humidity: 58,
            season: Season::Winter,
            housing_quality: HousingQuality::WellVentilated,
        }
    }

    #[test]
    fn test_categorical_parse_known_and_other() {
        assert_eq!(Breed::parse("Murrah Buffalo"), Breed::MurrahBuffalo);
        assert_eq!(Breed::parse(" Jersey "), Breed::Jersey);
        let other = Breed::parse("Brown Swiss");
        assert_eq!(other, Breed::Other("Brown Swiss".to_string()));
        assert!(!other.is_known());
        assert_eq!(other.as_str(), "Brown Swiss");
    }

    #[test]
    fn test_breed_baselines() {
        assert_eq!(Breed::Holstein.yield_baseline(), 25.0);
        assert_eq!(Breed::Jersey.yield_baseline(), 18.0);
        assert_eq!(Breed::MurrahBuffalo.yield_baseline(), 12.0);
        assert_eq!(Breed::Gir.yield_baseline(), 10.0);
        assert_eq!(Breed::Other("Angus".into()).yield_baseline(), 10.0);
    }

    #[test]
    fn test_record_json_uses_column_names() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["Breed"], "Holstein");
        assert_eq!(json["Feed_Type"], "Mixed Ration");
        assert_eq!(json["Humidity"], 58);
        assert_eq!(json["Animal_ID"], "CATTLE_1000");
    }

    #[test]
    fn test_record_rejects_wrong_semantic_type() {
        let mut json = serde_json::to_value(sample_record()).unwrap();
        json["Age"] = serde_json::json!("old");
        assert!(serde_json::from_value::<CattleRecord>(json).is_err());
    }

    #[test]
    fn test_record_rejects_missing_field() {
        let mut json = serde_json::to_value(sample_record()).unwrap();
        json.as_object_mut().unwrap().remove("Heart_Rate");
        assert!(serde_json::from_value::<CattleRecord>(json).is_err());
    }

    #[test]
    fn test_validate_semantic_ranges() {
        assert!(sample_record().validate().is_ok());

        let mut record = sample_record();
        record.parity = 0;
        assert!(matches!(
            record.validate(),
            Err(SchemaError::InvalidValue { ref field, .. }) if field == "Parity"
        ));

        let mut record = sample_record();
        record.humidity = 140;
        assert!(record.validate().is_err());

        let mut record = sample_record();
        record.breed = Breed::Other(String::new());
        assert!(matches!(record.validate(), Err(SchemaError::MissingField(_))));
    }

    #[test]
    fn test_disease_label_round_trip_names() {
        for label in DiseaseLabel::ALL {
            assert_eq!(label.as_str().parse::<DiseaseLabel>().unwrap(), label);
        }
        assert!("Flu".parse::<DiseaseLabel>().is_err());
        let json = serde_json::to_string(&DiseaseLabel::HeatStress).unwrap();
        assert_eq!(json, "\"Heat Stress\"");
    }

    #[test]
    fn test_field_lookup_by_column() {
        assert_eq!(NumericField::from_column("Rest_Hours"), Some(NumericField::RestHours));
        assert_eq!(CategoricalField::from_column("Season"), Some(CategoricalField::Season));
        assert_eq!(NumericField::from_column("Breed"), None);
    }
}
