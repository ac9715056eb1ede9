use crate::core::catalog::PlanCatalog;
use crate::core::engine::AnalysisRequest;
use crate::core::filters::{
    AmountRangeFilter, DurationFilter, ExcludeCustomersFilter, FilterChain, LessonTypeFilter,
    ShortPeriodFilter, StatusFilter, TestInstanceFilter, WeeklyFrequencyFilter,
};
use crate::core::validate::{deserialize_optional_date, RecordOverride};
use crate::domain::model::{BillingMode, LessonPlan, LessonType, MonthKey};
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation::{
    validate_month_window, validate_non_empty_string, validate_ordered_pair, validate_path,
    validate_positive_number, Validate,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub overrides: Vec<RecordOverride>,
    /// Replaces the built-in catalog when present.
    #[serde(default)]
    pub plans: Vec<LessonPlan>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSection {
    pub name: Option<String>,
    #[serde(default)]
    pub billing_mode: BillingMode,
    pub from_month: Option<MonthKey>,
    pub to_month: Option<MonthKey>,
    /// Cutoff date, either a bare TOML date or a quoted string.
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiltersConfig {
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub min_duration_months: Option<u32>,
    pub max_duration_months: Option<u32>,
    pub lesson_type: Option<LessonType>,
    pub weekly_frequency: Option<u32>,
    pub short_period_days: Option<u32>,
    /// An empty list selects the default statuses.
    pub excluded_statuses: Option<Vec<String>>,
    pub test_instances: Option<TestInstanceConfig>,
    #[serde(default)]
    pub exclude_customers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestInstanceConfig {
    pub pattern: String,
    #[serde(default)]
    pub exceptions: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl AnalysisConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AnalysisError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| AnalysisError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AnalysisError::ProcessingError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if self.source.path.trim().is_empty() {
            return Err(AnalysisError::MissingConfigError {
                field: "source.path".to_string(),
            });
        }
        validate_path("source.path", &self.source.path)?;

        if let Some(name) = &self.analysis.name {
            validate_non_empty_string("analysis.name", name)?;
        }
        validate_month_window(
            "analysis.from_month..analysis.to_month",
            self.analysis.from_month,
            self.analysis.to_month,
        )?;

        let filters = &self.filters;
        if let (Some(min), Some(max)) = (filters.min_amount, filters.max_amount) {
            validate_ordered_pair("filters.min_amount..filters.max_amount", min, max)?;
        }
        if let Some(min) = filters.min_duration_months {
            validate_positive_number("filters.min_duration_months", min, 1)?;
        }
        if let (Some(min), Some(max)) = (filters.min_duration_months, filters.max_duration_months) {
            validate_ordered_pair("filters.min_duration_months..filters.max_duration_months", min, max)?;
        }
        if let Some(freq) = filters.weekly_frequency {
            validate_positive_number("filters.weekly_frequency", freq, 1)?;
        }
        if let Some(days) = filters.short_period_days {
            validate_positive_number("filters.short_period_days", days, 1)?;
        }
        if let Some(test) = &filters.test_instances {
            validate_non_empty_string("filters.test_instances.pattern", &test.pattern)?;
        }

        for (index, fix) in self.overrides.iter().enumerate() {
            validate_non_empty_string(&format!("overrides[{}].email", index), &fix.email)?;
        }

        // 自訂方案目錄需通過同樣的檢查
        self.catalog()?;
        self.filter_chain()?;
        Ok(())
    }

    pub fn catalog(&self) -> Result<PlanCatalog> {
        if self.plans.is_empty() {
            Ok(PlanCatalog::default_catalog())
        } else {
            PlanCatalog::new(self.plans.clone())
        }
    }

    /// Filters in a fixed order: cheap record checks first, plan attributes last.
    pub fn filter_chain(&self) -> Result<FilterChain> {
        let filters = &self.filters;
        let mut chain = FilterChain::new();

        if !filters.exclude_customers.is_empty() {
            chain.push(Box::new(ExcludeCustomersFilter::new(&filters.exclude_customers)));
        }
        if let Some(test) = &filters.test_instances {
            let filter = TestInstanceFilter::new(&test.pattern, &test.exceptions, &test.blocked)
                .map_err(|e| AnalysisError::InvalidConfigValueError {
                    field: "filters.test_instances.pattern".to_string(),
                    value: test.pattern.clone(),
                    reason: e.to_string(),
                })?;
            chain.push(Box::new(filter));
        }
        if let Some(statuses) = &filters.excluded_statuses {
            if statuses.is_empty() {
                chain.push(Box::new(StatusFilter::default()));
            } else {
                chain.push(Box::new(StatusFilter::new(statuses)));
            }
        }
        if filters.min_amount.is_some() || filters.max_amount.is_some() {
            chain.push(Box::new(AmountRangeFilter::new(
                filters.min_amount.unwrap_or(0.0),
                filters.max_amount.unwrap_or(f64::MAX),
            )));
        }
        if let Some(days) = filters.short_period_days {
            chain.push(Box::new(ShortPeriodFilter::new(i64::from(days))));
        }
        if filters.min_duration_months.is_some() || filters.max_duration_months.is_some() {
            chain.push(Box::new(DurationFilter::new(
                filters.min_duration_months.unwrap_or(1),
                filters.max_duration_months.unwrap_or(u32::MAX),
            )));
        }
        if let Some(lesson_type) = filters.lesson_type {
            chain.push(Box::new(LessonTypeFilter::new(lesson_type)));
        }
        if let Some(freq) = filters.weekly_frequency {
            chain.push(Box::new(WeeklyFrequencyFilter::new(freq)));
        }

        Ok(chain)
    }

    pub fn to_request(&self) -> AnalysisRequest {
        AnalysisRequest {
            from: self.analysis.from_month,
            to: self.analysis.to_month,
            as_of: self.analysis.as_of,
            billing_mode: self.analysis.billing_mode,
            overrides: self.overrides.clone(),
        }
    }

    pub fn name(&self) -> &str {
        self.analysis.name.as_deref().unwrap_or("lesson-churn")
    }

    /// 取得監控設定
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl Validate for AnalysisConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
