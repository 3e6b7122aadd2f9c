// Context keys instead of loose strings scattered across handlers.
pub mod session_keys {
    pub const USER_INPUT: &str = "user_input";
    pub const SESSION_ID: &str = "session_id";
    pub const CUSTOMER_PHONE: &str = "customer_phone";
    pub const CUSTOMER_NAME: &str = "customer_name";
    pub const CUSTOMER_ADDRESS: &str = "customer_address";
    pub const PRE_APPROVED_LIMIT: &str = "pre_approved_limit";
    pub const LOAN_AMOUNT: &str = "loan_amount";
    pub const LOAN_TENURE: &str = "loan_tenure";
    pub const LOAN_PURPOSE: &str = "loan_purpose";
    pub const OFFERED_DISCOUNT: &str = "offered_discount";
    pub const FINAL_DECISION: &str = "final_decision";
    pub const EXTRACTED_SALARY: &str = "extracted_salary";
}
