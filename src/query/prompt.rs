use super::Dialect;

pub const DATABASE_SCHEMA: &str = "\
Table: mis_long
Columns:
- store_name (TEXT): Name of the store
- parameter (TEXT): Type of metric (Area, Revenue, EBITDA, Transactions, COGS, Electricity, Gross Margin, Gross Profit, Others, People Cost, Rent, Revenue/Sq. Ft., Sales Commission, Avg Size of Transactions, %)
- cafe_code (TEXT): Store code identifier
- region (TEXT): Geographic region (Delhi, Mumbai, Bangalore, Gurgaon, Pune, Noida, etc.)
- category (TEXT): Store category (CWK, SIS/Others)
- for_ssg (TEXT): SSG flag
- area_store (DOUBLE): Store area in square feet
- store_start_date (DATE): Store opening date
- vintage (TEXT): Store vintage (FY18, FY19, etc.)
- month (DATE): Month (first of month, format: YYYY-MM-01)
- value (DOUBLE): Numeric value for the metric; percentages are stored as decimals (12% = 0.12)

Key Metrics:
- Revenue: Total revenue for the store
- EBITDA: Earnings before interest, taxes, depreciation, and amortization
- Transactions: Number of transactions
- Area: Store area in square feet
- COGS: Cost of goods sold
- Rent: Rent expenses
- People Cost: Employee costs
- Electricity: Electricity expenses
- Gross Margin: Gross profit margin
- Revenue/Sq. Ft.: Revenue per square foot
- Sales Commission: Commission expenses
";

pub const EXAMPLE_QUERIES: &str = "\
Example queries and their SQL:

1. \"What are the top 10 stores by revenue in 2024?\"
SELECT store_name, region, SUM(value) AS total_revenue
FROM mis_long
WHERE parameter = 'Revenue'
  AND month BETWEEN '2024-01-01' AND '2024-12-31'
GROUP BY store_name, region
ORDER BY total_revenue DESC
LIMIT 10;

2. \"Show me monthly transaction trends\"
SELECT month, SUM(value) AS total_transactions
FROM mis_long
WHERE parameter = 'Transactions'
GROUP BY month
ORDER BY month;

3. \"Which region has the highest EBITDA in 2024?\"
SELECT region, SUM(value) AS total_ebitda
FROM mis_long
WHERE parameter = 'EBITDA'
  AND month BETWEEN '2024-01-01' AND '2024-12-31'
GROUP BY region
ORDER BY total_ebitda DESC;

4. \"What's the average store area by region?\"
SELECT region, AVG(area_store) AS avg_area
FROM mis_long
WHERE area_store IS NOT NULL
GROUP BY region
ORDER BY avg_area DESC;
";

/// Questions offered on the web UI's examples page.
pub const EXAMPLE_QUESTIONS: &[&str] = &[
    "What are the top 10 stores by revenue in 2024?",
    "Show me monthly transaction trends",
    "Which region has the highest EBITDA?",
    "What's the average store area by category?",
    "Show me revenue per square foot for each store",
    "Which stores have the highest profit margins?",
    "Compare CWK vs SIS/Others performance",
    "Show me quarterly revenue trends by vintage cohort",
    "What's the growth rate of transactions year over year?",
    "Which vintage cohort performs best?",
];

fn dialect_instructions(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::DuckDb => "\
1. Convert the user's natural language question into a precise SQL query
2. Always use proper SQL syntax for DuckDB
3. Use appropriate date filtering (the data spans 2021-2025)
4. Handle NULL values appropriately
5. Use meaningful column aliases
6. Return ONLY the SQL query, no explanations or markdown formatting
7. If the query asks for trends over time, group by month and order by month
8. If asking for top/best performers, use ORDER BY ... DESC LIMIT
9. Use SUM() for aggregating values, AVG() for averages
10. Always filter by parameter when looking for specific metrics",
        Dialect::Postgres => "\
1. Generate PostgreSQL-compatible SQL queries
2. Always use proper date handling for the 'month' column
3. For revenue/EBITDA queries, filter by parameter = 'Revenue' or parameter = 'EBITDA'
4. For transaction queries, filter by parameter = 'Transactions'
5. Use appropriate aggregations (SUM, AVG, COUNT) based on the question
6. Include proper WHERE clauses to filter by date ranges when relevant
7. Use LIMIT when appropriate to prevent overwhelming results
8. For time-based queries, use DATE_TRUNC or EXTRACT functions
9. Column aliases cannot be referenced in WHERE or HAVING; repeat the expression
10. Return ONLY the SQL query, no explanations or markdown formatting",
    }
}

pub fn system_prompt(dialect: Dialect) -> String {
    format!(
        "You are a SQL expert specializing in retail store analytics.\n\
         You have access to a {} database with the following schema:\n\n\
         {DATABASE_SCHEMA}\n\
         {EXAMPLE_QUERIES}\n\
         Instructions:\n{}",
        dialect.label(),
        dialect_instructions(dialect)
    )
}

pub fn user_prompt(question: &str) -> String {
    format!("Convert this natural language question to SQL: {}", question.trim())
}
