fn main() {
    gitlab_timer_lib::run()
}
