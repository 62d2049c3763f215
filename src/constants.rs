/// Source column names after header cleanup. These double as the staging
/// table's column identifiers, which the dbt models select from.
pub const GENDER: &str = "Gender";
pub const AGE: &str = "Age";
pub const TENURE: &str = "Tenure";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const TOTAL_CHARGES: &str = "TotalCharges";
pub const CONTRACT_TYPE: &str = "ContractType";
pub const INTERNET_SERVICE: &str = "InternetService";
pub const CHURN: &str = "Churn";

// Derived and bookkeeping columns
pub const IS_FEMALE: &str = "is_female";
pub const IS_SENIOR: &str = "is_senior";
pub const LOAD_TIME: &str = "Last_load_time";

/// Every column the normalizer needs from the input artifact
pub const REQUIRED_COLUMNS: [&str; 8] = [
    GENDER,
    AGE,
    TENURE,
    MONTHLY_CHARGES,
    TOTAL_CHARGES,
    CONTRACT_TYPE,
    INTERNET_SERVICE,
    CHURN,
];

pub const UNKNOWN: &str = "Unknown";
pub const DEFAULT_CHURN: &str = "No";

/// Customers strictly older than this are seniors.
pub const SENIOR_AGE_THRESHOLD: i64 = 64;

/// Cell contents read as missing, matching the usual dataframe CSV reader.
pub const NULL_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Timestamp suffix format for archived artifacts
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y_%m_%d-%H_%M_%S";
