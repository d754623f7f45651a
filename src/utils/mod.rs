pub mod employee_locks;
