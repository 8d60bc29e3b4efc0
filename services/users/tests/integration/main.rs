mod db_test;
mod helpers;
mod scenario_test;
mod user_test;
